use std::collections::BTreeSet;

use super::types::Model;
use crate::error::ModelIncompleteError;
use crate::table::StrataId;

/// Check the model has an entry for every required stratum.
///
/// Reports every missing stratum in one pass, sorted and deduplicated.
pub fn validate_model<'a, I>(model: &Model, required: I) -> Result<(), ModelIncompleteError>
where
    I: IntoIterator<Item = &'a StrataId>,
{
    let missing: BTreeSet<&StrataId> = required
        .into_iter()
        .filter(|id| !model.contains(id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ModelIncompleteError {
            missing: missing.into_iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Range, StratumParams};
    use crate::table::INDICATOR_COUNT;
    use std::collections::BTreeMap;

    fn model_with(strata: &[&str]) -> Model {
        let params = StratumParams::new(
            [Range::Normal { min: 0.0, max: 1.0 }; INDICATOR_COUNT],
            [1.0 / INDICATOR_COUNT as f64; INDICATOR_COUNT],
        );
        let map: BTreeMap<_, _> = strata
            .iter()
            .map(|s| (StrataId::from(*s), params))
            .collect();
        Model::new(vec![], map)
    }

    #[test]
    fn test_complete_model() {
        let model = model_with(&["101", "102"]);
        let required = [StrataId::from("101"), StrataId::from("102")];
        assert!(validate_model(&model, &required).is_ok());
    }

    #[test]
    fn test_reports_all_missing_strata() {
        let model = model_with(&["101"]);
        let required = [
            StrataId::from("205"),
            StrataId::from("101"),
            StrataId::from("103"),
            StrataId::from("205"),
        ];
        let err = validate_model(&model, &required).unwrap_err();
        assert_eq!(err.missing, vec![StrataId::from("103"), StrataId::from("205")]);
    }
}
