use std::net::UdpSocket;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use crate::key::Key;
use crate::node::node_data::NodeData;
use crate::MESSAGE_LENGTH;

/// A request envelope. `responder_id` is the identifier the sender believes
/// the responder owns; the responder refuses the request with an identity
/// mismatch when it differs from its own id, which flags the sender's routing
/// entry as stale.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request {
    pub token: u64,
    pub responder_id: Key,
    pub sender: NodeData,
    pub payload: RequestPayload,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum RequestPayload {
    GetPredecessor,
    GetSuccessor,
    FindSuccessor(Key),
    ClosestPrecedingFinger(Key),
    Notify(NodeData),
    TransferKeys { from: NodeData, boundary: Key },
    SetPredecessor(NodeData),
    SetSuccessor(NodeData),
    Put(String, String),
    Get(String),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Response {
    pub token: u64,
    pub responder: NodeData,
    pub payload: ResponsePayload,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ResponsePayload {
    Node(NodeData),
    NodeOption(Option<NodeData>),
    Value(Option<String>),
    Ok,
    Error(RpcError),
}

/// An error carried back over the wire inside a well-formed response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum RpcError {
    IdentityMismatch { expected: Key, actual: Key },
    Unavailable,
    LookupFailed(String),
}

#[derive(Serialize, Deserialize, Debug)]
pub enum Message {
    Request(Request),
    Response(Response),
    Kill,
}

/// The datagram transport. A reader thread decodes every inbound datagram and
/// forwards it to the node's message handler through a channel; sending is a
/// single encoded datagram to the peer's address.
#[derive(Clone)]
pub struct Protocol {
    socket: Arc<UdpSocket>,
}

impl Protocol {
    pub fn new(socket: UdpSocket, tx: Sender<Message>) -> Protocol {
        let protocol = Protocol {
            socket: Arc::new(socket),
        };
        let ret = protocol.clone();
        thread::spawn(move || {
            let mut buffer = [0u8; MESSAGE_LENGTH];
            loop {
                let len = match protocol.socket.recv_from(&mut buffer) {
                    Ok((len, _)) => len,
                    Err(err) => {
                        warn!("Protocol: socket closed: {}", err);
                        break;
                    },
                };
                let message = match bincode::deserialize(&buffer[..len]) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("Protocol: dropping undecodable datagram: {}", err);
                        continue;
                    },
                };

                if tx.send(message).is_err() {
                    warn!("Protocol: connection closed.");
                    break;
                }
            }
        });
        ret
    }

    pub fn send_message(&self, message: &Message, addr: &str) {
        let buffer = match bincode::serialize(message) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("Protocol: could not encode message: {}", err);
                return;
            },
        };
        if buffer.len() > MESSAGE_LENGTH {
            warn!(
                "Protocol: dropping oversized message of {} bytes to {}",
                buffer.len(),
                addr
            );
            return;
        }
        if self.socket.send_to(&buffer, addr).is_err() {
            warn!("Protocol: could not send data to {}.", addr);
        }
    }
}
