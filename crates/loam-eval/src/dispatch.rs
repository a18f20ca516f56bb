use std::rc::Rc;

use loam_core::instruction::DispatchCandidate;
use loam_core::matching::{rank_overloads, OverloadResolution};
use loam_core::types::Type;
use loam_core::LoamError;

/// Pick the winning candidate for the given runtime argument types.
pub fn select_candidate(
    candidates: &[DispatchCandidate],
    argument_types: &[Rc<Type>],
) -> Result<usize, LoamError> {
    let resolution = rank_overloads(
        candidates.iter().map(|c| c.parameter_types.as_ref()),
        argument_types,
    );
    match resolution {
        OverloadResolution::Selected(i) => Ok(i),
        OverloadResolution::NoMatch => Err(LoamError::no_overload(
            "dispatch",
            describe_types(argument_types),
        )),
        OverloadResolution::Ambiguous(a, b) => Err(LoamError::no_overload(
            "dispatch",
            format!(
                "{}: candidates {a} and {b} are equally specific",
                describe_types(argument_types)
            ),
        )),
    }
}

fn describe_types(types: &[Rc<Type>]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
