//! ChannelPolicy port - per-channel subscription authorization.
//!
//! Authentication only establishes *who* is connected. Deployments that need
//! to restrict *which* channels an identity may watch (for example tenant
//! scoped `orders/<tenant>` channels) implement this trait.

use crate::domain::bus::ChannelName;
use crate::domain::foundation::Identity;

/// Decides whether an identity may subscribe to a channel.
pub trait ChannelPolicy: Send + Sync {
    fn can_subscribe(&self, identity: &Identity, channel: &ChannelName) -> bool;
}

/// Default policy: every authenticated identity may subscribe anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllChannels;

impl ChannelPolicy for AllowAllChannels {
    fn can_subscribe(&self, _identity: &Identity, _channel: &ChannelName) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[test]
    fn allow_all_admits_any_channel() {
        let identity = Identity::new(UserId::new("user-1").unwrap());
        let channel = ChannelName::parse("orders/warehouse-9").unwrap();
        assert!(AllowAllChannels.can_subscribe(&identity, &channel));
    }
}
