//! Static catalog of vendor methods.
//!
//! # Design
//! The catalog is plain data: a slice of `(method id, description)` pairs
//! mirroring what `uber.method_list` reports, indexed once on first use.
//! It is never mutated at runtime. A `MethodId` can only be constructed for
//! a cataloged method, so holding one proves the method exists.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::error::ApiError;

/// Every method the vendor API exposes, grouped by namespace.
pub static METHODS: &[(&str, &str)] = &[
    ("client.ach_add", "Add a new bank account to a client's account"),
    ("client.ach_delete", "Delete a client's bank account"),
    ("client.ach_update", "Update a client's bank account"),
    ("client.add", "Create a new client account"),
    ("client.cc_add", "Add a new credit card to a client's account"),
    ("client.cc_delete", "Delete a client's credit card"),
    ("client.cc_update", "Update a client's credit card"),
    ("client.comment_list", "List comments attached to a client"),
    ("client.contact_add", "Add a new contact to a client's account"),
    ("client.contact_delete", "Delete a client contact"),
    ("client.contact_get", "Get the details of a client contact"),
    ("client.contact_list", "List a client's contacts"),
    ("client.contact_update", "Update a client contact"),
    ("client.count", "Count clients matching the given criteria"),
    ("client.credit_add", "Add a credit to a client's account"),
    ("client.credit_comment_list", "List comments attached to a credit"),
    ("client.credit_deactivate", "Deactivate a client credit"),
    ("client.credit_list", "List a client's credits"),
    ("client.deactivate", "Deactivate a client account"),
    ("client.domain_add", "Add a domain to a client's account"),
    ("client.domain_list", "List a client's domains"),
    ("client.domain_lookup", "Look up domain availability"),
    ("client.domain_register", "Register a domain for a client"),
    ("client.domain_transfer", "Transfer a domain to a client"),
    ("client.get", "Get a client's details"),
    ("client.invoice_charge", "Charge an invoice to a client's payment method"),
    ("client.invoice_count", "Count a client's invoices"),
    ("client.invoice_disregard", "Disregard an invoice"),
    ("client.invoice_generate", "Generate an invoice for a client"),
    ("client.invoice_get", "Get an invoice"),
    ("client.invoice_list", "List a client's invoices"),
    ("client.invoice_payments", "List the payments applied to an invoice"),
    ("client.invoice_post_gw_payment", "Record a gateway payment against an invoice"),
    ("client.latest_client", "Get the most recently created client"),
    ("client.list", "List clients"),
    ("client.lookup", "Look up clients by criteria"),
    ("client.metadata_get", "Get a client's metadata"),
    ("client.metadata_single", "Get a single metadata value for a client"),
    ("client.payment_method_list", "List a client's payment methods"),
    ("client.payment_refund", "Refund a payment"),
    ("client.reactivate", "Reactivate a client account"),
    ("client.renewal_list", "List upcoming service renewals"),
    ("client.send_welcome", "Send the welcome message to a client"),
    ("client.service_add", "Add a new service to a client's account"),
    ("client.service_comment_list", "List comments attached to a service"),
    ("client.service_deactivate", "Deactivate a client service"),
    ("client.service_get", "Get the details of a client service"),
    ("client.service_list", "List a client's services"),
    ("client.service_metadata_get", "Get a service's metadata"),
    ("client.service_metadata_single", "Get a single metadata value for a service"),
    ("client.service_module_call", "Call a service module function"),
    ("client.service_prorate", "Prorate a client service"),
    ("client.service_update", "Update a client service"),
    ("client.set_login", "Set a client's login credentials"),
    ("client.update", "Update a client's details"),
    ("device.add", "Add a new device"),
    ("device.comment_list", "List comments attached to a device"),
    ("device.connection_list", "List a device's connections"),
    ("device.cpanel_add", "Add a cPanel account to a device"),
    ("device.delete", "Delete a device"),
    ("device.event_list", "List events for a device"),
    ("device.facility_list", "List facilities"),
    ("device.get", "Get a device's details"),
    ("device.hostname_get", "Get a device's hostname"),
    ("device.ip_assign", "Assign an IP address to a device"),
    ("device.ip_assignment_add", "Add an IP assignment"),
    ("device.ip_assignment_delete", "Delete an IP assignment"),
    ("device.ip_assignment_list", "List IP assignments"),
    ("device.ip_assignment_update", "Update an IP assignment"),
    ("device.ip_get_available", "List available IP addresses"),
    ("device.ip_get_unassigned", "List unassigned IP addresses"),
    ("device.ip_group_add", "Add an IP group"),
    ("device.ip_group_delete", "Delete an IP group"),
    ("device.ip_group_list", "List IP groups"),
    ("device.ip_group_update", "Update an IP group"),
    ("device.ip_lookup", "Look up an IP address"),
    ("device.ip_unassign", "Unassign an IP address from a device"),
    ("device.list", "List devices"),
    ("device.module_call", "Call a device module function"),
    ("device.module_call_aggregate", "Call a device module function across devices"),
    ("device.module_graph", "Get a device module graph image"),
    ("device.monitor_add", "Add a monitor to a device"),
    ("device.monitor_delete", "Delete a device monitor"),
    ("device.monitor_disable", "Disable a device monitor"),
    ("device.monitor_enable", "Enable a device monitor"),
    ("device.monitor_list", "List device monitors"),
    ("device.monitor_update", "Update a device monitor"),
    ("device.reboot", "Reboot a device"),
    ("device.reboot_graph", "Get a device reboot graph"),
    ("device.tag", "Tag a device"),
    ("device.type_list", "List device types"),
    ("device.untag", "Remove a tag from a device"),
    ("device.update", "Update a device"),
    ("device.vlan_get_available", "List available VLANs"),
    ("order.cancel", "Cancel an order"),
    ("order.client_respond", "Post a client response to an order"),
    ("order.coupon_get", "Get the details of a coupon"),
    ("order.create", "Create a new order"),
    ("order.get", "Get an order's details"),
    ("order.list", "List orders"),
    ("order.process", "Process an order"),
    ("order.queue_list", "List order queues"),
    ("order.respond", "Post a staff response to an order"),
    ("order.submit", "Submit an order"),
    ("order.update", "Update an order"),
    ("sales.opportunity_add", "Add a sales opportunity"),
    ("sales.opportunity_list", "List sales opportunities"),
    ("sales.opportunity_stage_list", "List sales opportunity stages"),
    ("sales.opportunity_status_list", "List sales opportunity statuses"),
    ("sales.opportunity_type_list", "List sales opportunity types"),
    ("sales.opportunity_update", "Update a sales opportunity"),
    ("support.department_get", "Get a support department"),
    ("support.department_list", "List support departments"),
    ("support.ticket_count", "Count support tickets"),
    ("support.ticket_get", "Get a support ticket"),
    ("support.ticket_list", "List support tickets"),
    ("support.ticket_merge", "Merge support tickets"),
    ("support.ticket_post_client_response", "Post a client response to a ticket"),
    ("support.ticket_post_list", "List the posts on a ticket"),
    ("support.ticket_post_staff_response", "Post a staff response to a ticket"),
    ("support.ticket_submit", "Submit a new support ticket"),
    ("support.ticket_submit_outgoing", "Submit a new outgoing support ticket"),
    ("support.ticket_update", "Update a support ticket"),
    ("uber.api_export", "Export table data in CSV format"),
    ("uber.attachment_get", "Get an attachment"),
    ("uber.attachment_list", "List attachments"),
    ("uber.check_login", "Check the specified username and password"),
    ("uber.client_welcome_stats", "Output the statistics shown at the top of the client interface"),
    ("uber.comment_add", "Add a comment"),
    ("uber.comment_delete", "Delete a comment"),
    ("uber.comment_get", "Get a comment"),
    ("uber.comment_list", "List comments"),
    ("uber.comment_update", "Update a comment"),
    ("uber.documentation", "Get a PDF document describing every API method"),
    ("uber.event_list", "List system events"),
    ("uber.forgot_pass", "Send a password reset message"),
    ("uber.login_list", "List logins"),
    ("uber.mail_get", "Get a mail message"),
    ("uber.mail_list", "List mail messages"),
    ("uber.message_list", "List messages"),
    ("uber.metadata_bulk_get", "Get metadata for several objects"),
    ("uber.metadata_get", "Get metadata"),
    ("uber.method_get", "Get the details of an API method"),
    ("uber.method_list", "Get a list of all available API methods"),
    ("uber.quick_stats", "Get summary statistics"),
    ("uber.quick_stats_detail", "Get detailed summary statistics"),
    ("uber.service_plan_get", "Get a service plan"),
    ("uber.service_plan_list", "List service plans"),
    ("uber.user_exists", "Check whether a user exists"),
    ("uber.username_exists", "Check whether a username is taken"),
];

static INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| METHODS.iter().copied().collect());

/// Description of `id`, if the method is cataloged.
pub fn lookup(id: &str) -> Option<&'static str> {
    INDEX.get(id).copied()
}

pub fn is_valid(id: &str) -> bool {
    INDEX.contains_key(id)
}

/// Every cataloged method id, in catalog order.
pub fn methods() -> impl Iterator<Item = MethodId> {
    METHODS.iter().map(|(id, _)| MethodId { id: *id })
}

/// Cataloged method ids in `namespace`.
pub fn namespace(namespace: &str) -> impl Iterator<Item = MethodId> + '_ {
    methods().filter(move |m| m.namespace() == namespace)
}

/// A cataloged `namespace.action` method id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    id: &'static str,
}

impl MethodId {
    /// Validate `raw` against the catalog.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let Some((namespace, action)) = raw.split_once('.') else {
            return Err(ApiError::Request(format!(
                "method '{raw}' is not of the form namespace.action"
            )));
        };
        if namespace.is_empty() || action.is_empty() {
            return Err(ApiError::Request(format!(
                "method '{raw}' is not of the form namespace.action"
            )));
        }
        INDEX
            .get_key_value(raw)
            .map(|(id, _)| MethodId { id: *id })
            .ok_or_else(|| ApiError::Request(format!("requested method '{raw}' is not valid")))
    }

    pub fn as_str(&self) -> &'static str {
        self.id
    }

    pub fn namespace(&self) -> &'static str {
        self.id.split_once('.').map_or(self.id, |(ns, _)| ns)
    }

    pub fn action(&self) -> &'static str {
        self.id.split_once('.').map_or("", |(_, action)| action)
    }

    pub fn description(&self) -> &'static str {
        lookup(self.id).unwrap_or_default()
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}
