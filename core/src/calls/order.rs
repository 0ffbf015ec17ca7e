//! `order.*` contracts and helpers.

use crate::call::{CallSpec, CleanRules, Required, Shape};
use crate::clean::{Cleaner, Converter, DictCleaner};
use crate::encode::Args;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::response::DictResponse;

use super::{render, set, set_opt};

fn order_fields() -> DictCleaner {
    Cleaner::dict()
        .field("order_id", Converter::Int)
        .field("order_status", Converter::Int)
        .field("client_id", Converter::Int)
        .field("order_form_id", Converter::Int)
        .field("order_queue_id", Converter::Int)
        .field("opportunity_id", Converter::Int)
        .field("total", Converter::Decimal)
        .field("activity", Converter::Timestamp)
        .field("ts", Converter::Timestamp)
}

fn order_record() -> Cleaner {
    let progress = Cleaner::dict()
        .keys(Converter::Int)
        .values(Cleaner::dict().field("ts", Converter::Timestamp));
    order_fields().field("progress", progress).into()
}

fn order_summary() -> Cleaner {
    order_fields().field("priority", Converter::Int).into()
}

fn queue() -> Cleaner {
    let steps = Cleaner::dict()
        .keys(Converter::Int)
        .values(Cleaner::dict().field("count", Converter::Int));
    Cleaner::dict().field("steps", steps).into()
}

pub const GET: CallSpec = CallSpec::new("order.get")
    .required(&[Required::AnyOf(&["order_id", "hash"])])
    .shape(Shape::Flat(CleanRules::Cleaner(order_record)));

pub const LIST: CallSpec =
    CallSpec::new("order.list").shape(Shape::Group(CleanRules::Cleaner(order_summary)));

pub const QUEUE_LIST: CallSpec = CallSpec::new("order.queue_list")
    .required(&[Required::Field("brand_id")])
    .shape(Shape::Group(CleanRules::Cleaner(queue)));

/// Get an order by id or by its public hash.
pub fn get(order_id: Option<i64>, hash: Option<&str>, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set_opt(&mut args, "order_id", order_id);
    set_opt(&mut args, "hash", hash);
    render(&GET, args, handler)?.into_dict()
}

/// Orders keyed by id.
pub fn list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&LIST, filters, handler)?.into_dict()
}

pub fn queue_list(brand_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "brand_id", brand_id);
    render(&QUEUE_LIST, args, handler)?.into_dict()
}
