mod command_input;
mod input;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use input::{InputResult, TextInput};
pub use search_input::{SearchEvent, SearchInput};

/// What a component did with a key it was offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed silently
  Handled,
  /// Consumed, and the owner has something to act on
  Event(T),
  /// Not ours; the owner tries its own bindings
  NotHandled,
}
