//! Static directory of the nodes taking part in a distributed simulation.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// A coupling from an output port of a node to an input port of another node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Output port of the source node.
    pub from_port: String,
    /// Name of the destination node.
    pub to_node: String,
    /// Input port of the destination node.
    pub to_port: String,
}

/// A node hosting one atomic model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Name of the hosted model, unique within the directory.
    pub name: String,
    /// Address on which the node server listens.
    pub address: SocketAddr,
    /// Outbound links of the node.
    #[serde(default)]
    pub links: Vec<Link>,
}

/// The host/port directory shared by the coordinator and every node server.
///
/// Nodes are addressed by the name of the model they host. The directory also
/// holds the couplings between nodes, since output values are pushed directly
/// from node to node without transiting through the coordinator.
///
/// The directory derives the `serde` traits so it can be loaded from a
/// configuration file in any format supported by `serde`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// The nodes, in the order in which the coordinator addresses them.
    pub nodes: Vec<NodeEntry>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node, replacing the address of a node of the same name.
    pub fn add_node(&mut self, name: impl Into<String>, address: SocketAddr) -> &mut Self {
        let name = name.into();
        match self.nodes.iter_mut().find(|n| n.name == name) {
            Some(node) => node.address = address,
            None => self.nodes.push(NodeEntry {
                name,
                address,
                links: Vec::new(),
            }),
        }

        self
    }

    /// Couples an output port of a node to an input port of another node.
    ///
    /// Links from nodes that are not registered are ignored by node servers;
    /// links to unregistered nodes are reported when the source node starts.
    pub fn link(
        &mut self,
        from_node: &str,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
        to_port: impl Into<String>,
    ) -> &mut Self {
        let link = Link {
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        };
        if let Some(node) = self.nodes.iter_mut().find(|n| n.name == from_node) {
            node.links.push(link);
        }

        self
    }

    /// Returns the entry of a node.
    pub fn node(&self, name: &str) -> Option<&NodeEntry> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Returns the address of a node.
    pub fn address(&self, name: &str) -> Option<SocketAddr> {
        self.node(name).map(|n| n.address)
    }
}
