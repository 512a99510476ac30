pub mod resolve;

pub use resolve::{resolve_page_view, WidgetHandlerState};
