//! `support.*` contracts and helpers.

use crate::call::{CallSpec, CleanRules, Shape};
use crate::clean::FieldRules;
use crate::encode::Args;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::response::DictResponse;

use super::render;

const DEPARTMENT: FieldRules = FieldRules {
    int_fields: &["q_id", "q_order"],
    ..FieldRules::EMPTY
};

pub const DEPARTMENT_LIST: CallSpec =
    CallSpec::new("support.department_list").shape(Shape::Group(CleanRules::Fields(DEPARTMENT)));

/// Support departments keyed by id.
pub fn department_list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&DEPARTMENT_LIST, filters, handler)?.into_dict()
}
