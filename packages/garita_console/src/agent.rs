//! Wires the push channels to the reconciliation consumers.
//!
//! Two connections, matching the server's two stream endpoints: the main
//! stream carries user/company record changes, the request stream carries
//! access-request events. Each connection has its own handler registry and
//! supervisor; consumers register into whichever registry their events
//! arrive on.

use std::sync::Arc;

use garita_stream::{ChannelSupervisor, HandlerRegistry, StreamConnector};
use tracing::{debug, warn};

use crate::api::ConsoleApi;
use crate::config::Config;
use crate::state::{CompanyCache, NotificationInbox, ProfileCache};

pub struct ConsoleAgent {
    main_channel: ChannelSupervisor,
    requests_channel: ChannelSupervisor,
    inbox: Arc<NotificationInbox>,
    company: Arc<CompanyCache>,
    profile: Arc<ProfileCache>,
    api: Arc<dyn ConsoleApi>,
}

impl ConsoleAgent {
    pub fn new(
        config: &Config,
        api: Arc<dyn ConsoleApi>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        let inbox = NotificationInbox::new(Arc::clone(&api));
        let company = CompanyCache::new(Arc::clone(&api));
        let profile = ProfileCache::open(config.profile_path());

        let main_registry = HandlerRegistry::new();
        company.attach(&main_registry);
        profile.attach(&main_registry);

        let requests_registry = HandlerRegistry::new();
        inbox.attach(&requests_registry);

        let main_channel = ChannelSupervisor::new(
            Arc::clone(&connector),
            main_registry,
            config.stream_url(),
            config.channel.clone(),
        );
        let requests_channel = ChannelSupervisor::new(
            connector,
            requests_registry,
            config.requests_stream_url(),
            config.channel.clone(),
        );

        Self {
            main_channel,
            requests_channel,
            inbox,
            company,
            profile,
            api,
        }
    }

    /// Open both channels (no-op while unauthenticated) and run the initial
    /// non-silent loads.
    pub async fn start(&self, credential: Option<&str>) {
        self.main_channel.ensure(credential);
        self.requests_channel.ensure(credential);

        let authenticated = credential.is_some_and(|token| !token.trim().is_empty());
        if !authenticated {
            debug!("not authenticated, skipping initial loads");
            return;
        }

        self.inbox.load().await;
        self.company.load().await;
        if self.profile.user().await.is_none() {
            match self.api.current_user().await {
                Ok(Some(user)) => self.profile.set(user).await,
                Ok(None) => debug!("current user fetch rejected"),
                Err(err) => warn!(%err, "current user fetch failed"),
            }
        }
    }

    /// Re-evaluate the connections after a credential change. Opening,
    /// closing, and switching identity all go through the supervisors' key
    /// comparison.
    pub fn reauthenticate(&self, credential: Option<&str>) {
        self.main_channel.ensure(credential);
        self.requests_channel.ensure(credential);
    }

    /// Close both channels and stop the consumers from applying any results
    /// still in flight.
    pub fn shutdown(&self) {
        self.main_channel.close();
        self.requests_channel.close();
        self.inbox.detach();
        self.company.detach();
        self.profile.detach();
    }

    pub fn inbox(&self) -> &Arc<NotificationInbox> {
        &self.inbox
    }

    pub fn company(&self) -> &Arc<CompanyCache> {
        &self.company
    }

    pub fn profile(&self) -> &Arc<ProfileCache> {
        &self.profile
    }
}
