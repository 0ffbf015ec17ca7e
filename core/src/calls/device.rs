//! `device.*` contracts and helpers.

use crate::call::{CallSpec, CleanRules, Required, Shape};
use crate::clean::{Cleaner, Converter};
use crate::encode::Args;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::response::DictResponse;

use super::{render, set};

fn device_record() -> Cleaner {
    let ints = [
        "active",
        "cage_id",
        "clientid",
        "dev",
        "devtype_group_id",
        "disabled",
        "down",
        "fac_id",
        "owner",
        "parent",
        "rack_id",
        "row_id",
        "total",
        "type_id",
        "up",
        "warn",
        "zone_id",
    ];
    let cleaner = ints
        .into_iter()
        .fold(Cleaner::dict(), |cleaner, field| cleaner.field(field, Converter::Int));
    cleaner
        .field("depth", Converter::Float)
        .field("height", Converter::Float)
        .field("width", Converter::Float)
        .into()
}

fn connection() -> Cleaner {
    let ints = [
        "connection_id",
        "connection_type_id",
        "connection_class_id",
        "status",
        "client_id",
        "service_id",
        "src_device_id",
        "src_interface_id",
        "src_node_type_id",
        "dst_device_id",
        "dst_interface_id",
        "dst_node_type_id",
        "num_links",
    ];
    let timestamps = ["start_ts", "end_ts", "created_ts", "updated_ts"];
    let cleaner = ints
        .into_iter()
        .fold(Cleaner::dict(), |cleaner, field| cleaner.field(field, Converter::Int));
    timestamps
        .into_iter()
        .fold(cleaner, |cleaner, field| cleaner.field(field, Converter::Timestamp))
        .into()
}

fn ip_assignment() -> Cleaner {
    let ints = [
        "addr_type",
        "assign_id",
        "client_id",
        "device_id",
        "group_client_id",
        "group_id",
        "num_ips",
        "service_id",
        "vlan_num",
        "vlan_range_id",
        "vlan_type_id",
    ];
    ints.into_iter()
        .fold(Cleaner::dict(), |cleaner, field| cleaner.field(field, Converter::Int))
        .field("portable", Converter::Bool)
        .field("created_ts", Converter::Timestamp)
        .field("updated_ts", Converter::Timestamp)
        .into()
}

fn monitor() -> Cleaner {
    Cleaner::dict()
        .field("dev", Converter::Int)
        .field("script_id", Converter::Int)
        .field("last_change", Converter::Timestamp)
        .field("last_notified", Converter::Timestamp)
        .field("last_poll", Converter::Timestamp)
        .into()
}

pub const CONNECTION_LIST: CallSpec = CallSpec::new("device.connection_list")
    .required(&[Required::Field("device_id")])
    .shape(Shape::Group(CleanRules::Cleaner(connection)));

pub const GET: CallSpec = CallSpec::new("device.get")
    .required(&[Required::Field("device_id")])
    .shape(Shape::Flat(CleanRules::Cleaner(device_record)));

pub const LIST: CallSpec =
    CallSpec::new("device.list").shape(Shape::Group(CleanRules::Cleaner(device_record)));

pub const IP_ASSIGNMENT_LIST: CallSpec =
    CallSpec::new("device.ip_assignment_list").shape(Shape::Group(CleanRules::Cleaner(ip_assignment)));

pub const MONITOR_LIST: CallSpec = CallSpec::new("device.monitor_list")
    .required(&[Required::Field("protocol")])
    .shape(Shape::Group(CleanRules::Cleaner(monitor)));

pub fn connection_list(device_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "device_id", device_id);
    render(&CONNECTION_LIST, args, handler)?.into_dict()
}

pub fn get(device_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "device_id", device_id);
    render(&GET, args, handler)?.into_dict()
}

/// Devices keyed by id.
pub fn list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&LIST, filters, handler)?.into_dict()
}

pub fn ip_assignment_list(filters: Args, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&IP_ASSIGNMENT_LIST, filters, handler)?.into_dict()
}

/// Monitors of one protocol (`ping`, `http`, ...).
pub fn monitor_list(
    protocol: &str,
    filters: Args,
    handler: Option<&RequestHandler>,
) -> Result<DictResponse, ApiError> {
    let mut args = filters;
    set(&mut args, "protocol", protocol);
    render(&MONITOR_LIST, args, handler)?.into_dict()
}
