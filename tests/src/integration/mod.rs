//! End-to-end scenarios across a CSMS, a relay and a device.

mod flows;
mod forwarding;
mod scenarios;
mod signatures;
