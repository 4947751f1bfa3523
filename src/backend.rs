//! The native platform seam.
//!
//! The engine never touches platform view types directly; it drives an
//! implementation of [`Backend`] and holds opaque [`NativeHandle`]s to the
//! elements the backend creates. Present and dismiss are async and resolve
//! only when the platform transition has fully completed, which is what lets
//! the engine serialize transitions without polling. Stack mutation is
//! synchronous: it returns once the platform has accepted the new entry list,
//! while any animation plays out on its own.
//!
//! Notifications that originate natively (back gestures, modal swipes, bar
//! button taps, tab selection) come back as [`BackendEvent`]s, which the
//! embedder feeds to [`Navigator::handle_backend_event`].
//!
//! [`Navigator::handle_backend_event`]: crate::engine::Navigator::handle_backend_event

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::options::ComponentOptions;

/// Identifies a native element for its entire lifetime.
///
/// Tokens are engine-assigned, monotonically increasing and never reused, so
/// a stale [`BackendEvent`] can never be misattributed to a newer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementToken(pub(crate) u64);

impl fmt::Display for ElementToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An engine-owned reference to a backend element.
///
/// The engine holds the only strong `Arc`s to handles; the registry holds
/// weak ones. When the engine drops a component, its handle (and the backend
/// element inside) goes with it.
pub struct NativeHandle<R> {
    token: ElementToken,
    backing: R,
}

impl<R> NativeHandle<R> {
    pub(crate) fn new(token: ElementToken, backing: R) -> Arc<NativeHandle<R>> {
        Arc::new(NativeHandle { token, backing })
    }

    pub fn token(&self) -> ElementToken {
        self.token
    }

    pub fn backing(&self) -> &R {
        &self.backing
    }
}

impl<R> fmt::Debug for NativeHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("token", &self.token)
            .finish()
    }
}

/// How a root is presented over the host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationStyle {
    #[default]
    FullScreen,
    PageSheet,
    FormSheet,
}

impl PresentationStyle {
    pub fn parse(s: &str) -> Option<PresentationStyle> {
        match s {
            "fullScreen" => Some(PresentationStyle::FullScreen),
            "pageSheet" => Some(PresentationStyle::PageSheet),
            "formSheet" => Some(PresentationStyle::FormSheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationStyle::FullScreen => "fullScreen",
            PresentationStyle::PageSheet => "pageSheet",
            PresentationStyle::FormSheet => "formSheet",
        }
    }
}

/// A backend implementation.
///
/// Creation and stack mutation are synchronous; `present` and `dismiss`
/// resolve when the platform transition completes. Implementations must be
/// callable from the engine's worker task.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// The platform element type behind a [`NativeHandle`].
    type Element: Send + Sync + 'static;

    /// Whether a host window exists to present into.
    fn has_host_window(&self) -> bool;

    fn create_stack(&self, token: ElementToken) -> Result<Self::Element>;

    fn create_tabs(&self, token: ElementToken) -> Result<Self::Element>;

    fn create_view(&self, token: ElementToken) -> Result<Self::Element>;

    /// Presents a root over the host window. Resolves when the transition
    /// has completed.
    ///
    /// `cancellable` controls whether the platform lets the user dismiss
    /// the root themselves (for sheets, the swipe-down gesture); such a
    /// dismissal must be reported as [`BackendEvent::ModalDismissed`].
    async fn present(
        &self,
        root: &NativeHandle<Self::Element>,
        style: PresentationStyle,
        cancellable: bool,
        animated: bool,
    ) -> Result<()>;

    /// Dismisses a presented root. Resolves when the transition has
    /// completed.
    async fn dismiss(&self, root: &NativeHandle<Self::Element>, animated: bool) -> Result<()>;

    /// Replaces a stack's entries with the given list, bottom to top.
    ///
    /// Returns once the platform has accepted the list; any animation
    /// continues after return.
    fn set_stack_entries(
        &self,
        stack: &NativeHandle<Self::Element>,
        entries: &[Arc<NativeHandle<Self::Element>>],
        animated: bool,
    ) -> Result<()>;

    fn set_tab_entries(
        &self,
        tabs: &NativeHandle<Self::Element>,
        entries: &[Arc<NativeHandle<Self::Element>>],
    ) -> Result<()>;

    /// The entries currently committed to the platform's back-stack, bottom
    /// to top. During an animation this may trail the intended entries.
    fn native_stack_entries(&self, stack: &NativeHandle<Self::Element>) -> Vec<ElementToken>;

    /// Applies merged styling options to an element.
    fn apply_options(
        &self,
        element: &NativeHandle<Self::Element>,
        options: &ComponentOptions,
        animated: bool,
    ) -> Result<()>;

    /// Releases platform resources for an element that left the tree.
    fn dispose(&self, element: &NativeHandle<Self::Element>);
}

/// A natively-originated notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A navigation bar button was tapped.
    BarButtonClick {
        element: ElementToken,
        button: String,
    },
    /// The user navigated back (gesture or back button); `visible` is the
    /// entry now showing.
    BackNavigated {
        stack: ElementToken,
        visible: ElementToken,
    },
    /// The user dismissed a presented root (e.g. a sheet swipe).
    ModalDismissed { root: ElementToken },
    /// The user selected a tab.
    TabSelected { tabs: ElementToken, index: usize },
}
