//! `client.*` contracts and helpers.

use crate::call::{CallSpec, CleanRules, Required, Shape};
use crate::clean::{Cleaner, Converter};
use crate::encode::Args;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::response::{DictResponse, IntResponse, VendorFile};

use super::{render, set, set_opt};

fn client_record() -> Cleaner {
    Cleaner::dict()
        .field("active", Converter::Bool)
        .field("clientid", Converter::Int)
        .field("class_id", Converter::Int)
        .field("priority", Converter::Int)
        .field("balance", Converter::Decimal)
        .field("commission", Converter::Decimal)
        .field("commission_rate", Converter::Decimal)
        .field("discount", Converter::Decimal)
        .field("tier_commission", Converter::Decimal)
        .field("tier_commission_rate", Converter::Decimal)
        .field("created", Converter::Timestamp)
        .field("latest_inv", Converter::Timestamp)
        .field("password_changed", Converter::Timestamp)
        .field("access", Converter::PhpSerialized)
        .into()
}

fn payment() -> Cleaner {
    Cleaner::dict().field("time", Converter::Timestamp).into()
}

fn invoice() -> Cleaner {
    Cleaner::dict()
        .field("clientid", Converter::Int)
        .field("invid", Converter::Int)
        .field("date", Converter::Timestamp)
        .field("datepaid", Converter::Timestamp)
        .field("due", Converter::Timestamp)
        .field("overdue", Converter::Timestamp)
        .into()
}

fn invoice_summary() -> Cleaner {
    Cleaner::dict()
        .field("clientid", Converter::Int)
        .field("invid", Converter::Int)
        .field("date", Converter::Timestamp)
        .field("datepaid", Converter::Timestamp)
        .field("due", Converter::Timestamp)
        .into()
}

fn credit() -> Cleaner {
    Cleaner::dict()
        .field("clientid", Converter::Int)
        .field("active", Converter::Int)
        .field("credit_id", Converter::Int)
        .field("order_id", Converter::Int)
        .field("date", Converter::Timestamp)
        .into()
}

pub const GET: CallSpec = CallSpec::new("client.get")
    .required(&[Required::AnyOf(&["client_id", "user_login", "email"])])
    .shape(Shape::Flat(CleanRules::Cleaner(client_record)));

pub const LIST: CallSpec =
    CallSpec::new("client.list").shape(Shape::Group(CleanRules::Cleaner(client_record)));

pub const PAYMENT_METHOD_LIST: CallSpec =
    CallSpec::new("client.payment_method_list").shape(Shape::Group(CleanRules::None));

pub const INVOICE_COUNT: CallSpec = CallSpec::new("client.invoice_count")
    .required(&[Required::Field("client_id")])
    .shape(Shape::Scalar(Converter::Int));

pub const INVOICE_PAYMENTS: CallSpec = CallSpec::new("client.invoice_payments")
    .required(&[Required::Field("invoice_id")])
    .shape(Shape::Group(CleanRules::Cleaner(payment)));

/// Returns the invoice record, or the PDF when `format=pdf`.
pub const INVOICE_GET: CallSpec = CallSpec::new("client.invoice_get")
    .required(&[Required::Field("invoice_id")])
    .shape(Shape::Flat(CleanRules::Cleaner(invoice)))
    .file_when("format", "pdf");

pub const INVOICE_LIST: CallSpec =
    CallSpec::new("client.invoice_list").shape(Shape::Group(CleanRules::Cleaner(invoice_summary)));

pub const CREDIT_LIST: CallSpec = CallSpec::new("client.credit_list")
    .required(&[Required::Field("client_id")])
    .shape(Shape::Group(CleanRules::Cleaner(credit)));

pub const SERVICE_ADD: CallSpec = CallSpec::new("client.service_add")
    .required(&[Required::Field("client_id")])
    .shape(Shape::Scalar(Converter::Int));

pub const CC_ADD: CallSpec = CallSpec::new("client.cc_add")
    .required(&[Required::Field("client_id"), Required::Field("cc_num")])
    .shape(Shape::Scalar(Converter::Int));

/// Get a client's details by id, login or email; at least one is needed.
pub fn get(
    client_id: Option<i64>,
    user_login: Option<&str>,
    email: Option<&str>,
    handler: Option<&RequestHandler>,
) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set_opt(&mut args, "client_id", client_id);
    set_opt(&mut args, "user_login", user_login);
    set_opt(&mut args, "email", email);
    render(&GET, args, handler)?.into_dict()
}

/// Clients keyed by id.
pub fn list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&LIST, filters, handler)?.into_dict()
}

pub fn payment_method_list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&PAYMENT_METHOD_LIST, filters, handler)?.into_dict()
}

pub fn invoice_count(client_id: i64, handler: Option<&RequestHandler>) -> Result<IntResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "client_id", client_id);
    render(&INVOICE_COUNT, args, handler)?.into_int()
}

pub fn invoice_payments(invoice_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "invoice_id", invoice_id);
    render(&INVOICE_PAYMENTS, args, handler)?.into_dict()
}

pub fn invoice_get(invoice_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "invoice_id", invoice_id);
    render(&INVOICE_GET, args, handler)?.into_dict()
}

/// Download an invoice as PDF.
pub fn invoice_pdf(invoice_id: i64, handler: Option<&RequestHandler>) -> Result<VendorFile, ApiError> {
    let mut args = Args::new();
    set(&mut args, "invoice_id", invoice_id);
    set(&mut args, "format", "pdf");
    render(&INVOICE_GET, args, handler)?.into_file()
}

pub fn invoice_list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&INVOICE_LIST, filters, handler)?.into_dict()
}

pub fn credit_list(client_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "client_id", client_id);
    render(&CREDIT_LIST, args, handler)?.into_dict()
}

/// Add a service; returns the new service id.
pub fn service_add(
    client_id: i64,
    service: Args,
    handler: Option<&RequestHandler>,
) -> Result<IntResponse, ApiError> {
    let mut args = service;
    set(&mut args, "client_id", client_id);
    render(&SERVICE_ADD, args, handler)?.into_int()
}

/// Add a credit card; returns the new billing info id.
pub fn cc_add(
    client_id: i64,
    cc_num: &str,
    details: Args,
    handler: Option<&RequestHandler>,
) -> Result<IntResponse, ApiError> {
    let mut args = details;
    set(&mut args, "client_id", client_id);
    set(&mut args, "cc_num", cc_num);
    render(&CC_ADD, args, handler)?.into_int()
}
