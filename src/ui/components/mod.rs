mod book_filters;
mod command_input;
mod confirm_dialog;
mod filter_bar;
mod filter_field_picker;
mod filter_source;
mod form;
mod input;
mod key_result;
mod search_input;

pub use book_filters::BookFilterField;
pub use command_input::{CommandEvent, CommandInput};
pub use confirm_dialog::{ConfirmDialog, ConfirmEvent};
pub use filter_bar::{FilterBar, FilterBarEvent};
pub use filter_field_picker::{FilterFieldPicker, FilterFieldPickerEvent};
pub use form::{Form, FormEvent};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
