//! Server composition
//!
//! `ServerBuilder` assembles the RPC, PubSub and auxiliary servers into one
//! [`WampServer`]. Each part comes from its own overridable method, so a
//! custom builder can replace one part and keep the defaults for the rest.

use std::sync::Arc;

use crate::broker::{TopicContainer, WampMessage};
use crate::config::{BrokerSettings, Settings};
use crate::server::auxiliary::AuxiliaryServer;
use crate::server::pubsub::PubSubServer;
use crate::server::rpc::RpcServer;

pub struct WampServer<M> {
    rpc: RpcServer<M>,
    pubsub: PubSubServer<M>,
    auxiliary: AuxiliaryServer<M>,
}

impl<M: WampMessage> WampServer<M> {
    pub fn new(rpc: RpcServer<M>, pubsub: PubSubServer<M>, auxiliary: AuxiliaryServer<M>) -> Self {
        Self {
            rpc,
            pubsub,
            auxiliary,
        }
    }

    /// A server built by [`DefaultServerBuilder`] over a fresh container.
    pub fn from_settings(settings: &Settings) -> Self {
        let container = Arc::new(TopicContainer::from_settings(&settings.broker));
        DefaultServerBuilder.build(&settings.broker, container)
    }

    pub fn rpc(&self) -> &RpcServer<M> {
        &self.rpc
    }

    pub fn pubsub(&self) -> &PubSubServer<M> {
        &self.pubsub
    }

    pub fn auxiliary(&self) -> &AuxiliaryServer<M> {
        &self.auxiliary
    }

    pub fn container(&self) -> &Arc<TopicContainer<M>> {
        self.pubsub.container()
    }
}

pub trait ServerBuilder<M: WampMessage> {
    fn build(&self, settings: &BrokerSettings, container: Arc<TopicContainer<M>>) -> WampServer<M> {
        let rpc = self.build_rpc_server();
        let pubsub = self.build_pubsub_server(container.clone());
        let auxiliary = self.build_auxiliary_server(settings, container);
        WampServer::new(rpc, pubsub, auxiliary)
    }

    fn build_rpc_server(&self) -> RpcServer<M> {
        RpcServer::new()
    }

    fn build_pubsub_server(&self, container: Arc<TopicContainer<M>>) -> PubSubServer<M> {
        PubSubServer::new(container)
    }

    fn build_auxiliary_server(
        &self,
        settings: &BrokerSettings,
        container: Arc<TopicContainer<M>>,
    ) -> AuxiliaryServer<M> {
        AuxiliaryServer::new(container, settings.max_sessions)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServerBuilder;

impl<M: WampMessage> ServerBuilder<M> for DefaultServerBuilder {}
