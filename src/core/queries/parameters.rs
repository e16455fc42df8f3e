use std::collections::HashMap;

use crate::models::QueryParameter;

/// Fill every declared parameter the caller left out (or left empty) with
/// its declared default. Supplied keys that are not declared pass through.
pub fn enrich_parameters(
    declared: &[QueryParameter],
    mut supplied: HashMap<String, String>,
) -> HashMap<String, String> {
    for parameter in declared {
        let missing = supplied
            .get(&parameter.name)
            .map_or(true, |value| value.is_empty());
        if missing {
            supplied.insert(parameter.name.clone(), parameter.default.clone());
        }
    }
    supplied
}
