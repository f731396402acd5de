// Wire protocol for the LiveDraft message bus.

pub mod bus;
