//! Binding layer - Shares connections between UI surfaces.
//!
//! - `ConnectionHub` - One manager per credential, ref-counted leases
//! - `SurfaceBinding` - Mount/unmount of a surface's listeners
//! - `UnreadBadge`, `ToastLayer`, `NotificationFeed`, `ConnectionIndicator` -
//!   The surfaces themselves

mod badge;
mod factory;
mod feed;
mod hub;
mod indicator;
mod surface;
mod toast;

pub use badge::UnreadBadge;
pub use factory::{ManagerFactory, SocketManagerFactory, StreamManagerFactory};
pub use feed::NotificationFeed;
pub use hub::{ConnectionHub, ConnectionLease};
pub use indicator::{ConnectionIndicator, IndicatorState};
pub use surface::{spawn_on_connected, SurfaceBinding, SurfaceListeners};
pub use toast::{ToastLayer, TracingToastSink};
