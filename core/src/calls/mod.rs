//! Dispatch table: every cataloged method mapped to a call contract.
//!
//! # Design
//! Methods with bespoke validation or cleaning have a hand-written
//! `CallSpec` in their namespace module, next to a typed helper function.
//! Every other cataloged method gets a generated pass-through contract, so
//! `call` can reach the whole catalog by name and returns loosely typed
//! data for methods nobody has described yet.

pub mod client;
pub mod device;
pub mod order;
pub mod support;
pub mod uber;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::call::{Call, CallSpec};
use crate::encode::{Arg, Args};
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::registry::{self, MethodId};
use crate::response::Cleaned;

static CONTRACTS: &[&CallSpec] = &[
    &client::GET,
    &client::LIST,
    &client::PAYMENT_METHOD_LIST,
    &client::INVOICE_COUNT,
    &client::INVOICE_PAYMENTS,
    &client::INVOICE_GET,
    &client::INVOICE_LIST,
    &client::CREDIT_LIST,
    &client::SERVICE_ADD,
    &client::CC_ADD,
    &device::CONNECTION_LIST,
    &device::GET,
    &device::LIST,
    &device::IP_ASSIGNMENT_LIST,
    &device::MONITOR_LIST,
    &order::GET,
    &order::LIST,
    &order::QUEUE_LIST,
    &support::DEPARTMENT_LIST,
    &uber::API_EXPORT,
    &uber::CHECK_LOGIN,
    &uber::CLIENT_WELCOME_STATS,
    &uber::METHOD_GET,
    &uber::METHOD_LIST,
    &uber::DOCUMENTATION,
];

static HAND_WRITTEN: Lazy<HashMap<&'static str, &'static CallSpec>> =
    Lazy::new(|| CONTRACTS.iter().map(|spec| (spec.method, *spec)).collect());

static GENERATED: Lazy<HashMap<&'static str, CallSpec>> = Lazy::new(|| {
    registry::methods()
        .filter(|method| !HAND_WRITTEN.contains_key(method.as_str()))
        .map(|method| (method.as_str(), CallSpec::new(method.as_str())))
        .collect()
});

/// Hand-written contract for `method`, if there is one.
pub fn contract(method: &str) -> Option<&'static CallSpec> {
    HAND_WRITTEN.get(method).copied()
}

/// Contract for any cataloged method; pass-through when none is written.
pub fn spec_for(method: &str) -> Result<&'static CallSpec, ApiError> {
    let method = MethodId::parse(method)?;
    contract(method.as_str())
        .or_else(|| GENERATED.get(method.as_str()))
        .ok_or_else(|| ApiError::Request(format!("no contract for {method}")))
}

/// Call any cataloged method by name.
pub fn call(handler: Option<&RequestHandler>, method: &str, args: Args) -> Result<Cleaned, ApiError> {
    Call::new(spec_for(method)?, args).render(handler)
}

fn render(spec: &CallSpec, args: Args, handler: Option<&RequestHandler>) -> Result<Cleaned, ApiError> {
    Call::new(spec, args).render(handler)
}

fn set(args: &mut Args, name: &str, value: impl Into<Arg>) {
    args.insert(name.to_string(), value.into());
}

fn set_opt<T: Into<Arg>>(args: &mut Args, name: &str, value: Option<T>) {
    if let Some(value) = value {
        set(args, name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Shape;

    #[test]
    fn hand_written_contracts_are_cataloged_and_unique() {
        assert_eq!(HAND_WRITTEN.len(), CONTRACTS.len());
        for spec in CONTRACTS {
            assert!(registry::is_valid(spec.method), "{}", spec.method);
        }
    }

    #[test]
    fn every_cataloged_method_has_a_contract() {
        for method in registry::methods() {
            let spec = spec_for(method.as_str()).unwrap();
            assert_eq!(spec.method, method.as_str());
        }
    }

    #[test]
    fn uncovered_methods_pass_through() {
        let spec = spec_for("client.add").unwrap();
        assert!(matches!(spec.shape, Shape::Passthrough));
        assert!(spec.required.is_empty());
        assert!(contract("client.add").is_none());
    }

    #[test]
    fn unknown_methods_have_no_contract() {
        assert!(matches!(spec_for("bogus.method"), Err(ApiError::Request(_))));
    }

    #[test]
    fn set_opt_skips_none() {
        let mut args = Args::new();
        set_opt(&mut args, "email", None::<&str>);
        set_opt(&mut args, "client_id", Some(5));
        assert_eq!(args.len(), 1);
        assert_eq!(args["client_id"], Arg::Int(5));
    }
}
