//! Side effects returned to the host UI.
//!
//! Mutations and invalidations hand their results back as a [`Command`]: a
//! stream of [`Action`]s the host drains, turning messages into state updates,
//! notifications into toasts and sign-in requests into navigation.

use futures::{
    FutureExt, Stream, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient, user-visible message such as "Added to watchlist".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }
}

/// An action that can be performed by a command.
pub enum Action<Msg> {
    /// Deliver a message to the host's update function.
    Message(Msg),

    /// Show a transient notification.
    Notify(Notification),

    /// The session is missing or expired; route the user to sign-in.
    RequireSignIn,
}

impl<Msg> Action<Msg> {
    /// Transforms the message carried by this action, leaving other actions intact.
    pub fn map<T>(self, f: impl FnOnce(Msg) -> T) -> Action<T> {
        match self {
            Self::Message(msg) => Action::Message(f(msg)),
            Self::Notify(notification) => Action::Notify(notification),
            Self::RequireSignIn => Action::RequireSignIn,
        }
    }
}

/// A command that can be executed to perform side effects.
///
/// # Examples
///
/// ```
/// use watchdeck::command::Command;
///
/// enum Message {
///     GotResult(i32),
/// }
///
/// let cmd = Command::perform(async { 42 }, Message::GotResult);
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a command that does nothing.
    #[must_use]
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Perform an asynchronous operation and convert its result to a message.
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Create a command from a future that produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Create a command that performs a single action immediately.
    ///
    /// ```
    /// use watchdeck::command::{Action, Command, Notification};
    ///
    /// let cmd: Command<()> = Command::effect(Action::Notify(Notification::success("Saved")));
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Create a command from a stream of actions.
    pub fn actions(actions: impl Stream<Item = Action<Msg>> + Send + 'static) -> Self {
        Self {
            stream: Some(actions.boxed()),
        }
    }

    /// Batch multiple commands into a single command.
    ///
    /// All commands run concurrently and the arrival order of their actions is
    /// unspecified. `Command::none()` entries are dropped.
    pub fn batch(commands: impl IntoIterator<Item = Self>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Create a command from a stream of messages.
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.map(Action::Message).boxed()),
        }
    }

    /// Run a stream and convert each item to a message.
    pub fn run<A>(
        stream: impl Stream<Item = A> + Send + 'static,
        f: impl Fn(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::stream(stream.map(f))
    }

    /// Transforms every message produced by this command.
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + 'static) -> Command<T> {
        Command {
            stream: self
                .stream
                .map(|stream| stream.map(move |action| action.map(&f)).boxed()),
        }
    }

    /// Returns `true` if this command has no side effects.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }

    /// Consumes the command, yielding its actions for the host to execute.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Action<Msg>> {
        self.stream.unwrap_or_else(|| stream::empty().boxed())
    }
}
