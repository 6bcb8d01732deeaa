/*!

An IEEE 1722.1 (AVDECC) controller core, over raw layer-2 Ethernet.

From IEEE Std 1722.1-2013:

> This standard defines the protocols, data formats and state machines
> used for the discovery, enumeration, connection management and
> control of IEEE 1722 based devices.  These devices include, but are
> not limited to, Talkers which are the sources of IEEE 1722 streams,
> Listeners which are the sinks of IEEE 1722 streams and Controllers
> which control the interactions between the Talkers and Listeners.

This crate implements the controller side of the three protocols
riding EtherType 0x22F0: ADP (discovery), AECP (enumeration and
control, including the Milan vendor-unique sub-protocol) and ACMP
(connection management).  It speaks through a pluggable
[`FrameEndpoint`], so the same state machines run over libpcap (the
`capture` feature) or the in-process [`LoopbackEndpoint`].

```no_run
use avdecc_ctrl::{Controller, ControllerConfig, LoopbackEndpoint, MacAddress};

let endpoint = LoopbackEndpoint::attach("virt0", MacAddress([2, 0, 0, 0, 0, 1]));
let controller = Controller::new(endpoint, ControllerConfig::default()).unwrap();
controller.discover_remote_entities().unwrap();
```

Discovered entities, command completions and unsolicited notifications
are reported through a [`ManagerObserver`] registered on the
controller's [`Manager`].
*/

mod dispatch;
mod endpoint;
mod error;
mod executor;
mod types;

pub mod controller;
pub mod entity;
pub mod model;
pub mod pdu;
pub mod state;

pub use controller::{Controller, ControllerConfig};
#[cfg(feature = "capture")]
pub use endpoint::CaptureEndpoint;
pub use endpoint::{EndpointSink, FrameEndpoint, LoopbackEndpoint};
pub use error::*;
pub use executor::{ExecutorGuard, Executors};
pub use pdu::{AaMode, AaStatus, AccessTlv};
pub use state::{Manager, ManagerConfig, ManagerObserver};
pub use types::*;
