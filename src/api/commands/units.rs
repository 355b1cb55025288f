//! Unit command module
//!
//! Conversions, unit selector options and free-text quantity parsing.

use tracing::debug;

use crate::core::units::convert::convert;
use crate::core::units::format::format_number;
use crate::core::units::parsing::parse_quantity;
use crate::core::units::registry::{
    default_unit, lookup, system_of, unit_option, units_for, Dimension, UnitOption,
};
use crate::shared::error::AppResult;
use crate::shared::types::{
    ConvertUnitsRequest, ConvertUnitsResponse, DefaultUnitRequest, GetUnitsResponse,
    ParseQuantityResponse, UnitDTO,
};

/// Convert an amount between two units of the same dimension
pub async fn convert_units_command(request: ConvertUnitsRequest) -> AppResult<ConvertUnitsResponse> {
    let result = convert(request.amount, request.dimension, &request.from_unit, &request.to_unit)?;

    Ok(ConvertUnitsResponse {
        result,
        formatted_result: format_number(result),
        from_unit: request.from_unit,
        to_unit: request.to_unit,
    })
}

/// Units of one dimension, or of every dimension when none is given
pub async fn get_units_command(dimension: Option<String>) -> AppResult<GetUnitsResponse> {
    let dimensions = match dimension {
        Some(name) => vec![name.parse::<Dimension>()?],
        None => Dimension::ALL.to_vec(),
    };

    let mut units = Vec::new();
    for dimension in dimensions {
        for symbol in units_for(dimension) {
            let def = lookup(symbol)?;
            units.push(UnitDTO {
                id: def.symbol.to_string(),
                label: def.label.to_string(),
                name: def.name.to_string(),
                dimension: def.dimension,
                system: system_of(def.symbol)?,
            });
        }
    }

    debug!(count = units.len(), "units listed");
    Ok(GetUnitsResponse { units })
}

/// Display unit picked for a canonical amount
pub async fn default_unit_command(request: DefaultUnitRequest) -> AppResult<UnitOption> {
    let symbol = default_unit(request.dimension, request.value, request.system)?;
    Ok(unit_option(symbol)?)
}

/// Parse text input and extract amount, unit, and dimension
pub async fn parse_quantity_command(text: String) -> AppResult<ParseQuantityResponse> {
    let quantity = parse_quantity(&text)?;

    Ok(ParseQuantityResponse {
        amount: quantity.value(),
        unit: quantity.unit().to_string(),
        dimension: quantity.dimension(),
    })
}
