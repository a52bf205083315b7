pub mod order_form;

pub use order_form::{reconcile_order_form, OrderFormJob};
