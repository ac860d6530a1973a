//! The mutable registry of clients and servers, independent of scheduling
//! state. Entities are only ever appended; ids grow monotonically and are
//! never reused within a run.

use std::collections::VecDeque;

use crate::workload::WorkItem;

identifier!(ClientId, u64);
identifier!(ServerId, u64);

/// A request-generating client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derive_new::new, serde::Serialize, serde::Deserialize,
)]
pub struct Client {
    pub id: ClientId,
}

/// A server with a FIFO backlog and at most one item in flight.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: ServerId,
    pub queue: VecDeque<WorkItem>,
    pub current: Option<WorkItem>,
}

impl Server {
    pub(crate) fn new(id: ServerId) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            current: None,
        }
    }

    /// Number of admitted-but-unprocessed items.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Whether the server has nothing to work on.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    /// Items resident on this server, backlog plus the in-flight item.
    pub fn load(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }
}

/// The client/server registry.
#[derive(Debug, Clone)]
pub struct Topology {
    servers: Vec<Server>,
    clients: Vec<Client>,
}

impl Topology {
    /// Creates a topology with `nr_servers` servers and `nr_clients`
    /// clients, ids starting at 1.
    pub fn new(nr_servers: usize, nr_clients: usize) -> Self {
        let servers = (1..=nr_servers as u64)
            .map(|i| Server::new(ServerId::new(i)))
            .collect();
        let clients = (1..=nr_clients as u64)
            .map(|i| Client::new(ClientId::new(i)))
            .collect();
        Self { servers, clients }
    }

    /// Appends a server under the next id and returns that id.
    pub fn add_server(&mut self) -> ServerId {
        let max = self.servers.iter().map(|s| s.id.inner()).max().unwrap_or(0);
        let id = ServerId::new(max + 1);
        self.servers.push(Server::new(id));
        id
    }

    /// Appends a client under the next id and returns that id.
    pub fn add_client(&mut self) -> ClientId {
        let max = self.clients.iter().map(|c| c.id.inner()).max().unwrap_or(0);
        let id = ClientId::new(max + 1);
        self.clients.push(Client::new(id));
        id
    }

    /// Discards every entity and rebuilds the initial population.
    pub fn reset(&mut self, nr_servers: usize, nr_clients: usize) {
        *self = Self::new(nr_servers, nr_clients);
    }

    /// The registered servers, in list order.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub(crate) fn servers_mut(&mut self) -> &mut [Server] {
        &mut self.servers
    }

    /// Looks up a server by id.
    pub fn server_mut(&mut self, id: ServerId) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.id == id)
    }

    /// The registered clients, in list order.
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    delegate::delegate! {
        to self.servers {
            /// Number of registered servers.
            #[call(len)]
            pub fn nr_servers(&self) -> usize;
        }

        to self.clients {
            /// Number of registered clients.
            #[call(len)]
            pub fn nr_clients(&self) -> usize;
        }
    }
}
