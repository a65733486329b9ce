//! Exact same-family ratios. Volume is expressed in milliliters and weight in
//! grams, using the US customary definitions so chains of conversions do not
//! accumulate drift from rounded constants.

use super::unit::{Unit, UnitFamily};

pub const MILLILITERS_PER_TEASPOON: f64 = 4.928_921_593_75;
pub const MILLILITERS_PER_TABLESPOON: f64 = 14.786_764_781_25;
pub const MILLILITERS_PER_FLUID_OUNCE: f64 = 29.573_529_562_5;
pub const MILLILITERS_PER_CUP: f64 = 236.588_236_5;
pub const MILLILITERS_PER_PINT: f64 = 473.176_473;
pub const MILLILITERS_PER_QUART: f64 = 946.352_946;
pub const MILLILITERS_PER_GALLON: f64 = 3_785.411_784;
pub const MILLILITERS_PER_LITER: f64 = 1_000.0;
pub const MILLILITERS_PER_CENTILITER: f64 = 10.0;

pub const GRAMS_PER_POUND: f64 = 453.592_37;
pub const GRAMS_PER_OUNCE: f64 = 28.349_523_125;
pub const GRAMS_PER_KILOGRAM: f64 = 1_000.0;
pub const GRAMS_PER_MILLIGRAM: f64 = 0.001;

pub fn volume_ratio(unit: &Unit) -> Option<f64> {
    let ratio = match unit {
        Unit::Teaspoon => MILLILITERS_PER_TEASPOON,
        Unit::Tablespoon => MILLILITERS_PER_TABLESPOON,
        Unit::FluidOunce => MILLILITERS_PER_FLUID_OUNCE,
        Unit::Cup => MILLILITERS_PER_CUP,
        Unit::Pint => MILLILITERS_PER_PINT,
        Unit::Quart => MILLILITERS_PER_QUART,
        Unit::Gallon => MILLILITERS_PER_GALLON,
        Unit::Liter => MILLILITERS_PER_LITER,
        Unit::Centiliter => MILLILITERS_PER_CENTILITER,
        Unit::Milliliter => 1.0,
        _ => return None,
    };
    Some(ratio)
}

pub fn weight_ratio(unit: &Unit) -> Option<f64> {
    let ratio = match unit {
        Unit::Pound => GRAMS_PER_POUND,
        Unit::Ounce => GRAMS_PER_OUNCE,
        Unit::Gram => 1.0,
        Unit::Milligram => GRAMS_PER_MILLIGRAM,
        Unit::Kilogram => GRAMS_PER_KILOGRAM,
        _ => return None,
    };
    Some(ratio)
}

/// Ratios to the family base unit for a pair of units that share a table.
/// Count and other units never share one.
pub fn shared_family_ratios(from: &Unit, to: &Unit) -> Option<(f64, f64)> {
    match (from.family(), to.family()) {
        (UnitFamily::Volume, UnitFamily::Volume) => Some((volume_ratio(from)?, volume_ratio(to)?)),
        (UnitFamily::Weight, UnitFamily::Weight) => Some((weight_ratio(from)?, weight_ratio(to)?)),
        _ => None,
    }
}
