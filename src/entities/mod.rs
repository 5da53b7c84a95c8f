pub mod inventory_item;
pub mod quantity_audit_log;
pub mod session_log;
pub mod user_profile;
