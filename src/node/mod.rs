pub mod node_data;

use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::ChordError;
use crate::key::Key;
use crate::node::node_data::NodeData;
use crate::protocol::{
    Message, Protocol, Request, RequestPayload, Response, ResponsePayload, RpcError,
};
use crate::routing::{FingerEntry, FingerTable};
use crate::storage::Storage;
use crate::{FIX_FINGER_INTERVAL, KEY_BITS, LOOKUP_HOP_LIMIT, REQUEST_TIMEOUT, STABILIZE_INTERVAL};

/// The routing half of a node's state: successor and predecessor pointers and
/// the finger table, guarded by one lock so routing reads never observe a
/// half-applied update. The data store lives under its own lock; a slow
/// migration must not stall routing.
struct RingState {
    successor: NodeData,
    predecessor: Option<NodeData>,
    finger_table: FingerTable,
}

impl RingState {
    /// Replaces the successor, keeping finger row 0 in sync with it.
    fn set_successor(&mut self, node: NodeData) {
        self.finger_table.set_successor(node.clone());
        self.successor = node;
    }
}

/// A node in the Chord ring.
///
/// Cloning yields another handle onto the same node; the background threads
/// (message handler, stabilizer, finger fixer) each own one.
#[derive(Clone)]
pub struct Node {
    node_data: Arc<NodeData>,
    ring: Arc<Mutex<RingState>>,
    storage: Arc<Mutex<Storage>>,
    pending_requests: Arc<Mutex<HashMap<u64, Sender<Response>>>>,
    protocol: Arc<Protocol>,
    is_active: Arc<AtomicBool>,
    is_leaving: Arc<AtomicBool>,
    // held for the duration of every stabilize/fix-finger round; leave()
    // acquires it so no round can run once the splice has started
    maintenance: Arc<Mutex<()>>,
}

impl Node {
    /// Constructs a new `Node` on a specific ip and port, deriving its
    /// identifier from the bound address, and joins the ring `bootstrap`
    /// belongs to (or founds a new ring when `bootstrap` is `None`).
    pub fn new(ip: &str, port: &str, bootstrap: Option<NodeData>) -> Result<Self, ChordError> {
        Self::start(ip, port, bootstrap, None)
    }

    /// As [`new`], but with a caller-chosen identifier. Useful for tests and
    /// demos that need a controlled ring geometry.
    ///
    /// [`new`]: #method.new
    pub fn with_id(
        ip: &str,
        port: &str,
        bootstrap: Option<NodeData>,
        id: Key,
    ) -> Result<Self, ChordError> {
        Self::start(ip, port, bootstrap, Some(id))
    }

    fn start(
        ip: &str,
        port: &str,
        bootstrap: Option<NodeData>,
        defined_id: Option<Key>,
    ) -> Result<Self, ChordError> {
        ChordError::check_key_bits()?;

        let addr = format!("{}:{}", ip, port);
        let socket = UdpSocket::bind(addr).expect("Error: could not bind to address.");
        let addr = socket
            .local_addr()
            .expect("Error: could not read local address.")
            .to_string();
        let id = defined_id.unwrap_or_else(|| Key::hash(addr.as_bytes()));
        let node_data = Arc::new(NodeData { id, addr });

        let (message_tx, message_rx) = channel();
        let protocol = Protocol::new(socket, message_tx);

        let ring = RingState {
            successor: (*node_data).clone(),
            predecessor: None,
            finger_table: FingerTable::new(&node_data),
        };

        let node = Node {
            node_data,
            ring: Arc::new(Mutex::new(ring)),
            storage: Arc::new(Mutex::new(Storage::new())),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            protocol: Arc::new(protocol),
            is_active: Arc::new(AtomicBool::new(true)),
            is_leaving: Arc::new(AtomicBool::new(false)),
            maintenance: Arc::new(Mutex::new(())),
        };

        node.start_message_handler(message_rx);

        if let Err(err) = node.join(bootstrap) {
            error!("{} - could not join ring: {}", node.node_data.addr, err);
            node.protocol
                .send_message(&Message::Kill, &node.node_data.addr);
            return Err(err);
        }

        node.start_stabilizer();
        node.start_finger_fixer();
        info!(
            "{} - active in the ring as {:?}",
            node.node_data.addr, node.node_data.id
        );
        Ok(node)
    }

    /// Joins the ring.
    ///
    /// Without an introducer this node founds a new ring: it is its own
    /// successor and predecessor and every finger row already points at it.
    /// With an introducer, one remote lookup yields the successor; the
    /// predecessor stays absent until the first notify arrives, and the finger
    /// rows beyond row 0 are refined by the periodic fixer.
    fn join(&self, bootstrap: Option<NodeData>) -> Result<(), ChordError> {
        match bootstrap {
            None => {
                let mut ring = self.ring();
                ring.predecessor = Some(self.node_data());
                Ok(())
            },
            Some(introducer) => {
                let successor = self.rpc_find_successor(&introducer, &self.node_data.id)?;
                info!(
                    "{} - joining via {} with successor {:?}",
                    self.node_data.addr, introducer.addr, successor
                );
                self.ring().set_successor(successor);
                Ok(())
            },
        }
    }

    /// Starts the thread that dispatches inbound messages. Requests each get
    /// their own thread so a handler that performs remote calls of its own
    /// never blocks response delivery.
    fn start_message_handler(&self, rx: Receiver<Message>) {
        let node = self.clone();
        thread::spawn(move || {
            for message in rx.iter() {
                match message {
                    Message::Request(request) => {
                        let node = node.clone();
                        thread::spawn(move || node.handle_request(&request));
                    },
                    Message::Response(response) => node.handle_response(&response),
                    Message::Kill => {
                        node.is_active.store(false, Ordering::Release);
                        info!("{} - Killed message handler", node.node_data.addr);
                        break;
                    },
                }
            }
        });
    }

    /// Starts the thread that runs a stabilization round every
    /// `STABILIZE_INTERVAL` milliseconds until shutdown.
    fn start_stabilizer(&self) {
        let node = self.clone();
        thread::spawn(move || {
            while node.is_active.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(STABILIZE_INTERVAL));
                if !node.is_active.load(Ordering::Acquire) {
                    break;
                }
                if let Err(err) = node.stabilize() {
                    warn!(
                        "{} - skipping stabilize round: {}",
                        node.node_data.addr, err
                    );
                }
            }
            info!("{} - Killed stabilizer", node.node_data.addr);
        });
    }

    /// Starts the thread that refreshes one finger row every
    /// `FIX_FINGER_INTERVAL` milliseconds, cycling through all rows.
    fn start_finger_fixer(&self) {
        let node = self.clone();
        thread::spawn(move || {
            let mut row = 0;
            while node.is_active.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(FIX_FINGER_INTERVAL));
                if !node.is_active.load(Ordering::Acquire) {
                    break;
                }
                if let Err(err) = node.fix_finger(row) {
                    debug!(
                        "{} - skipping fix of finger row {}: {}",
                        node.node_data.addr, row, err
                    );
                }
                row = (row + 1) % KEY_BITS;
            }
            info!("{} - Killed finger fixer", node.node_data.addr);
        });
    }

    /// One stabilization round.
    ///
    /// Asks the successor for its predecessor `x`; when a node has inserted
    /// itself between us and our prior successor, `x` is that node and becomes
    /// the new successor. On a ring of one the arc `(local, successor)` is
    /// empty, so a second node announcing itself through notify is detected by
    /// identity instead. Finally, notify the successor that we believe we
    /// precede it.
    fn stabilize(&self) -> Result<(), ChordError> {
        let _round = self.maintenance_round();
        if !self.is_active.load(Ordering::Acquire) {
            return Ok(());
        }
        let self_data = self.node_data();
        let successor = { self.ring().successor.clone() };

        // the ring lock is never held across a remote call
        let x = if successor == self_data {
            self.ring().predecessor.clone()
        } else {
            self.rpc_get_predecessor(&successor)?
        };

        if let Some(x) = x {
            if x != self_data
                && (successor == self_data || x.id.is_between(&self_data.id, &successor.id))
            {
                info!("{} - new successor {:?}", self.node_data.addr, x);
                self.ring().set_successor(x);
            }
        }

        let successor = { self.ring().successor.clone() };
        if successor != self_data {
            self.rpc_notify(&successor)?;
        }
        Ok(())
    }

    /// Refreshes finger row `row` by looking up the successor of its start.
    /// Row 0 mirrors the successor pointer, so fixing it updates both under
    /// the same lock acquisition.
    fn fix_finger(&self, row: usize) -> Result<(), ChordError> {
        let _round = self.maintenance_round();
        if !self.is_active.load(Ordering::Acquire) {
            return Ok(());
        }
        let start = { *self.ring().finger_table.start(row) };
        let successor = self.locate_successor(&start)?;
        let mut ring = self.ring();
        if row == 0 {
            ring.set_successor(successor);
        } else {
            ring.finger_table.set_node(row, successor);
        }
        Ok(())
    }

    /// Finds the node owning `id`: the node whose identifier is the immediate
    /// circular successor of `id`.
    ///
    /// This is the hop loop of the lookup protocol. Each step reads the
    /// current node's successor and finishes when `id` lies in
    /// `(current, successor]` (or the current node is its own successor, a
    /// ring of one); otherwise the current node's closest preceding finger
    /// becomes the next hop. Every hop advances strictly clockwise toward
    /// `id`, and a defensive hop cap turns a corrupted ring into an error
    /// instead of an unbounded walk.
    pub fn locate_successor(&self, id: &Key) -> Result<NodeData, ChordError> {
        let self_data = self.node_data();
        let mut current = self_data.clone();
        for _ in 0..LOOKUP_HOP_LIMIT {
            let successor = if current == self_data {
                self.ring().successor.clone()
            } else {
                self.rpc_get_successor(&current)?
            };
            if current == successor || id.is_between_right_incl(&current.id, &successor.id) {
                return Ok(successor);
            }

            let hint = if current == self_data {
                self.closest_preceding_finger(id)
            } else {
                self.rpc_closest_preceding_finger(&current, id)?
            };
            if hint == current {
                // no better hint exists anywhere in current's table
                return Ok(successor);
            }
            current = hint;
        }
        Err(ChordError::HopLimitExceeded(LOOKUP_HOP_LIMIT))
    }

    /// Returns the highest finger whose node lies in the open arc
    /// `(local, id)`, or this node itself when no finger precedes `id`.
    fn closest_preceding_finger(&self, id: &Key) -> NodeData {
        let ring = self.ring();
        ring.finger_table
            .closest_preceding_node(&self.node_data.id, id)
            .cloned()
            .unwrap_or_else(|| self.node_data())
    }

    /// Handles a notify from a peer claiming to be our predecessor.
    ///
    /// The candidate is adopted when we have no predecessor, when we are alone
    /// on the ring (the predecessor is ourselves), or when the candidate falls
    /// inside `(predecessor, local)`. Whenever the candidate is our
    /// predecessor afterwards, every stored key whose hash falls outside our
    /// arc `(candidate, local]` is handed to it; running the hand-off on
    /// every notify from the current predecessor retries transfers that
    /// failed earlier.
    fn handle_notify(&self, candidate: &NodeData) {
        let self_data = self.node_data();
        if *candidate == self_data {
            return;
        }

        let is_predecessor = {
            let mut ring = self.ring();
            let adopt = match &ring.predecessor {
                None => true,
                Some(predecessor) => {
                    *predecessor == self_data
                        || candidate.id.is_between(&predecessor.id, &self_data.id)
                },
            };
            if adopt {
                info!(
                    "{} - adopting predecessor {:?}",
                    self.node_data.addr, candidate
                );
                ring.predecessor = Some(candidate.clone());
            }
            ring.predecessor.as_ref() == Some(candidate)
        };

        if is_predecessor {
            self.transfer_keys(candidate, |hash| {
                !hash.is_between_right_incl(&candidate.id, &self_data.id)
            });
        }
    }

    /// Hands every stored entry whose hashed key satisfies `predicate` to
    /// `dest`. An entry is deleted locally only after `dest` acknowledges the
    /// write, and only while it still holds the value that was transferred:
    /// a client write accepted during the hand-off stays put and rides the
    /// next round. A transient failure likewise leaves the key in place (at
    /// worst a harmless duplicate once the retry lands).
    fn transfer_keys<F>(&self, dest: &NodeData, predicate: F)
    where
        F: Fn(&Key) -> bool,
    {
        if *dest == self.node_data() {
            return;
        }
        let entries = { self.store().entries_where(predicate) };
        if entries.is_empty() {
            return;
        }
        info!(
            "{} - handing {} keys to {}",
            self.node_data.addr,
            entries.len(),
            dest.addr
        );
        for (key, value) in entries {
            match self.rpc_put(dest, &key, &value) {
                Ok(()) => {
                    self.store().remove_if_equals(&key, &value);
                },
                Err(err) => {
                    warn!(
                        "{} - keeping key {:?} for the next hand-off, transfer failed: {}",
                        self.node_data.addr, key, err
                    );
                },
            }
        }
    }

    /// Leaves the ring gracefully: stops the background threads, splices the
    /// predecessor and successor around this node, hands the entire remaining
    /// store to the successor, then shuts the listener down. New client
    /// writes are refused as soon as the leave begins; in-flight handlers
    /// finish.
    pub fn leave(&self) {
        if self.is_leaving.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("{} - leaving the ring", self.node_data.addr);

        // Stop the periodic protocols and wait out a round already in
        // flight before touching the neighbors: a stabilize running after
        // the splice would re-announce this node to its successor, which
        // would readopt it as predecessor.
        self.is_active.store(false, Ordering::Release);
        let _rounds = self.maintenance_round();

        let self_data = self.node_data();
        let (successor, predecessor) = {
            let ring = self.ring();
            (ring.successor.clone(), ring.predecessor.clone())
        };

        if successor != self_data {
            if let Some(predecessor) = predecessor.filter(|p| *p != self_data) {
                if let Err(err) = self.rpc_set_successor(&predecessor, &successor) {
                    warn!(
                        "{} - could not splice successor into {}: {}",
                        self.node_data.addr, predecessor.addr, err
                    );
                }
                if let Err(err) = self.rpc_set_predecessor(&successor, &predecessor) {
                    warn!(
                        "{} - could not splice predecessor into {}: {}",
                        self.node_data.addr, successor.addr, err
                    );
                }
            }
            self.transfer_keys(&successor, |_| true);
        }

        self.protocol
            .send_message(&Message::Kill, &self.node_data.addr);
        info!("{} - left the ring", self.node_data.addr);
    }

    /// Stores `value` under `key` on the node owning it, reached from this
    /// node. A stale routing entry surfaces as an identity mismatch from the
    /// old owner, in which case the owner is re-resolved once and the write
    /// retried.
    pub fn put(&self, key: &str, value: &str) -> Result<(), ChordError> {
        if self.is_leaving.load(Ordering::Acquire) {
            return Err(ChordError::Rejected {
                addr: self.node_data.addr.clone(),
                reason: String::from("node is leaving the ring"),
            });
        }
        let hash = Key::hash(key.as_bytes());
        let mut retried = false;
        loop {
            let owner = self.locate_successor(&hash)?;
            let result = if owner == self.node_data() {
                self.store().insert(key.to_string(), value.to_string());
                Ok(())
            } else {
                self.rpc_put(&owner, key, value)
            };
            match result {
                Err(ChordError::IdentityMismatch { .. }) if !retried => retried = true,
                other => return other,
            }
        }
    }

    /// Fetches the value stored under `key`, reached from this node. Returns
    /// `None` when the owner holds no such key. Re-resolves the owner once on
    /// an identity mismatch.
    pub fn get(&self, key: &str) -> Result<Option<String>, ChordError> {
        let hash = Key::hash(key.as_bytes());
        let mut retried = false;
        loop {
            let owner = self.locate_successor(&hash)?;
            let result = if owner == self.node_data() {
                Ok(self.store().get(key).cloned())
            } else {
                self.rpc_get(&owner, key)
            };
            match result {
                Err(ChordError::IdentityMismatch { .. }) if !retried => retried = true,
                other => return other,
            }
        }
    }

    /// Handles a request RPC: refuses it when this node is not the intended
    /// responder, dispatches it otherwise, and answers the sender.
    fn handle_request(&self, request: &Request) {
        debug!(
            "{} - Receiving request from {} {:?}",
            self.node_data.addr, request.sender.addr, request.payload,
        );
        let payload = if request.responder_id != self.node_data.id {
            warn!(
                "{} - refusing request meant for {:?}; the sender's routing entry is stale",
                self.node_data.addr, request.responder_id,
            );
            ResponsePayload::Error(RpcError::IdentityMismatch {
                expected: request.responder_id,
                actual: self.node_data.id,
            })
        } else {
            self.dispatch(&request.payload)
        };

        self.protocol.send_message(
            &Message::Response(Response {
                token: request.token,
                responder: self.node_data(),
                payload,
            }),
            &request.sender.addr,
        )
    }

    fn dispatch(&self, payload: &RequestPayload) -> ResponsePayload {
        match payload {
            RequestPayload::GetPredecessor => {
                ResponsePayload::NodeOption(self.ring().predecessor.clone())
            },
            RequestPayload::GetSuccessor => ResponsePayload::Node(self.ring().successor.clone()),
            RequestPayload::FindSuccessor(id) => match self.locate_successor(id) {
                Ok(node) => ResponsePayload::Node(node),
                Err(err) => ResponsePayload::Error(RpcError::LookupFailed(err.to_string())),
            },
            RequestPayload::ClosestPrecedingFinger(id) => {
                ResponsePayload::Node(self.closest_preceding_finger(id))
            },
            RequestPayload::Notify(candidate) => {
                self.handle_notify(candidate);
                ResponsePayload::Ok
            },
            RequestPayload::TransferKeys { from, boundary } => {
                let from = from.clone();
                let boundary = *boundary;
                self.transfer_keys(&from, |hash| {
                    hash.is_between_right_incl(&boundary, &from.id)
                });
                ResponsePayload::Ok
            },
            RequestPayload::SetPredecessor(node) => {
                self.ring().predecessor = Some(node.clone());
                ResponsePayload::Ok
            },
            RequestPayload::SetSuccessor(node) => {
                self.ring().set_successor(node.clone());
                ResponsePayload::Ok
            },
            RequestPayload::Put(key, value) => {
                if self.is_leaving.load(Ordering::Acquire) {
                    ResponsePayload::Error(RpcError::Unavailable)
                } else {
                    self.store().insert(key.clone(), value.clone());
                    ResponsePayload::Ok
                }
            },
            RequestPayload::Get(key) => ResponsePayload::Value(self.store().get(key).cloned()),
        }
    }

    /// Handles a response RPC. If the token in the response does not match any
    /// outgoing request, the response is ignored.
    fn handle_response(&self, response: &Response) {
        let pending_requests = self.pending();
        if let Some(sender) = pending_requests.get(&response.token) {
            debug!(
                "{} - Receiving response from {} {:?}",
                self.node_data.addr, response.responder.addr, response.payload,
            );
            // the waiting side may have timed out and dropped its receiver
            let _ = sender.send(response.clone());
        } else {
            warn!(
                "{} - Original request not found; irrelevant response or expired request.",
                self.node_data.addr
            );
        }
    }

    /// Sends a request RPC and waits for the matching response. A timeout
    /// maps to `Unreachable`; a wire-level error payload maps back into the
    /// error taxonomy.
    fn send_request(
        &self,
        dest: &NodeData,
        payload: RequestPayload,
    ) -> Result<ResponsePayload, ChordError> {
        debug!(
            "{} - Sending request to {} {:?}",
            self.node_data.addr, dest.addr, payload
        );
        let (response_tx, response_rx) = channel();
        let token = {
            let mut pending_requests = self.pending();
            let mut token = rand::random::<u64>();
            while pending_requests.contains_key(&token) {
                token = rand::random::<u64>();
            }
            pending_requests.insert(token, response_tx);
            token
        };

        self.protocol.send_message(
            &Message::Request(Request {
                token,
                responder_id: dest.id,
                sender: self.node_data(),
                payload,
            }),
            &dest.addr,
        );

        let result = response_rx.recv_timeout(Duration::from_millis(REQUEST_TIMEOUT));
        self.pending().remove(&token);
        match result {
            Ok(response) => match response.payload {
                ResponsePayload::Error(RpcError::IdentityMismatch { expected, actual }) => {
                    Err(ChordError::IdentityMismatch { expected, actual })
                },
                ResponsePayload::Error(RpcError::Unavailable) => Err(ChordError::Rejected {
                    addr: dest.addr.clone(),
                    reason: String::from("node is leaving the ring"),
                }),
                ResponsePayload::Error(RpcError::LookupFailed(reason)) => {
                    Err(ChordError::Rejected {
                        addr: dest.addr.clone(),
                        reason,
                    })
                },
                payload => Ok(payload),
            },
            Err(_) => {
                warn!(
                    "{} - Request to {} timed out after waiting for {} milliseconds",
                    self.node_data.addr, dest.addr, REQUEST_TIMEOUT
                );
                Err(ChordError::Unreachable {
                    addr: dest.addr.clone(),
                })
            },
        }
    }

    fn unexpected(&self, dest: &NodeData, payload: &ResponsePayload) -> ChordError {
        warn!(
            "{} - unexpected response from {}: {:?}",
            self.node_data.addr, dest.addr, payload
        );
        ChordError::Rejected {
            addr: dest.addr.clone(),
            reason: format!("unexpected response {:?}", payload),
        }
    }

    /// Sends a `GetPredecessor` RPC.
    fn rpc_get_predecessor(&self, dest: &NodeData) -> Result<Option<NodeData>, ChordError> {
        match self.send_request(dest, RequestPayload::GetPredecessor)? {
            ResponsePayload::NodeOption(node) => Ok(node),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `GetSuccessor` RPC.
    fn rpc_get_successor(&self, dest: &NodeData) -> Result<NodeData, ChordError> {
        match self.send_request(dest, RequestPayload::GetSuccessor)? {
            ResponsePayload::Node(node) => Ok(node),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `FindSuccessor` RPC.
    fn rpc_find_successor(&self, dest: &NodeData, id: &Key) -> Result<NodeData, ChordError> {
        match self.send_request(dest, RequestPayload::FindSuccessor(*id))? {
            ResponsePayload::Node(node) => Ok(node),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `ClosestPrecedingFinger` RPC.
    fn rpc_closest_preceding_finger(
        &self,
        dest: &NodeData,
        id: &Key,
    ) -> Result<NodeData, ChordError> {
        match self.send_request(dest, RequestPayload::ClosestPrecedingFinger(*id))? {
            ResponsePayload::Node(node) => Ok(node),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `Notify` RPC announcing this node as a predecessor candidate.
    fn rpc_notify(&self, dest: &NodeData) -> Result<(), ChordError> {
        match self.send_request(dest, RequestPayload::Notify(self.node_data()))? {
            ResponsePayload::Ok => Ok(()),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `TransferKeys` RPC asking `dest` to push every key in
    /// `(boundary, local]` back to this node.
    pub fn rpc_transfer_keys(&self, dest: &NodeData, boundary: &Key) -> Result<(), ChordError> {
        match self.send_request(
            dest,
            RequestPayload::TransferKeys {
                from: self.node_data(),
                boundary: *boundary,
            },
        )? {
            ResponsePayload::Ok => Ok(()),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `SetPredecessor` RPC, used when splicing the ring on leave.
    fn rpc_set_predecessor(
        &self,
        dest: &NodeData,
        predecessor: &NodeData,
    ) -> Result<(), ChordError> {
        match self.send_request(dest, RequestPayload::SetPredecessor(predecessor.clone()))? {
            ResponsePayload::Ok => Ok(()),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `SetSuccessor` RPC, used when splicing the ring on leave.
    fn rpc_set_successor(&self, dest: &NodeData, successor: &NodeData) -> Result<(), ChordError> {
        match self.send_request(dest, RequestPayload::SetSuccessor(successor.clone()))? {
            ResponsePayload::Ok => Ok(()),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `Put` RPC writing directly into `dest`'s store.
    fn rpc_put(&self, dest: &NodeData, key: &str, value: &str) -> Result<(), ChordError> {
        match self.send_request(
            dest,
            RequestPayload::Put(key.to_string(), value.to_string()),
        )? {
            ResponsePayload::Ok => Ok(()),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    /// Sends a `Get` RPC reading directly from `dest`'s store.
    fn rpc_get(&self, dest: &NodeData, key: &str) -> Result<Option<String>, ChordError> {
        match self.send_request(dest, RequestPayload::Get(key.to_string()))? {
            ResponsePayload::Value(value) => Ok(value),
            payload => Err(self.unexpected(dest, &payload)),
        }
    }

    fn ring(&self) -> MutexGuard<RingState> {
        match self.ring.lock() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn store(&self) -> MutexGuard<Storage> {
        match self.storage.lock() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn maintenance_round(&self) -> MutexGuard<()> {
        match self.maintenance.lock() {
            Ok(round) => round,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn pending(&self) -> MutexGuard<HashMap<u64, Sender<Response>>> {
        match self.pending_requests.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the `NodeData` associated with the node.
    pub fn node_data(&self) -> NodeData {
        (*self.node_data).clone()
    }

    /// Returns the node's current successor.
    pub fn successor(&self) -> NodeData {
        self.ring().successor.clone()
    }

    /// Returns the node's current predecessor, if one is known.
    pub fn predecessor(&self) -> Option<NodeData> {
        self.ring().predecessor.clone()
    }

    /// Returns a snapshot of the finger table.
    pub fn finger_entries(&self) -> Vec<FingerEntry> {
        self.ring().finger_table.entries()
    }

    /// Returns the number of keys currently stored on this node.
    pub fn storage_len(&self) -> usize {
        self.store().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_LENGTH;

    fn key(value: u8) -> Key {
        let mut bytes = [0; KEY_LENGTH];
        bytes[KEY_LENGTH - 1] = value;
        Key::new(bytes)
    }

    /// Finds a key whose hash falls on the arc `(from, to]`.
    fn key_hashing_between(from: u8, to: u8) -> String {
        (0..)
            .map(|i| format!("key-{}", i))
            .find(|k| Key::hash(k.as_bytes()).is_between_right_incl(&key(from), &key(to)))
            .unwrap()
    }

    #[test]
    fn test_stale_owner_mismatch_surfaces_and_clears_on_reresolve() {
        let a = Node::with_id("127.0.0.1", "0", None, key(10)).unwrap();
        let b = Node::with_id("127.0.0.1", "0", None, key(200)).unwrap();

        // park a's periodic maintenance so it cannot repair the planted
        // entry mid-test; client operations and the listener keep running
        a.is_active.store(false, Ordering::Release);
        drop(a.maintenance_round());

        // a's successor entry goes stale: b's address under an id that the
        // node at that address no longer answers for
        let stale = NodeData {
            id: key(150),
            addr: b.node_data().addr,
        };
        a.ring().set_successor(stale);

        let k = key_hashing_between(10, 150);
        match a.get(&k) {
            Err(ChordError::IdentityMismatch { expected, actual }) => {
                assert_eq!(expected, key(150));
                assert_eq!(actual, key(200));
            },
            other => panic!("expected an identity mismatch, got {:?}", other),
        }

        // once the entry is repaired the same lookup resolves cleanly
        a.ring().set_successor(b.node_data());
        assert_eq!(a.get(&k).unwrap(), None);

        b.leave();
        a.leave();
    }
}
