use futures_channel::oneshot;
use futures_util::future::{self, Either};
use mines_protocol::{Exchange, Operation, RequestFrame, RequestId, ResponseFrame};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::*;

/// Outgoing half of the duplex channel to the remote authority.
///
/// Incoming text frames are handed to [`RequestClient::handle_incoming`].
pub trait Transport {
    fn send(&self, frame: String) -> Result<(), TransportError>;
}

struct Pending {
    id: RequestId,
    operation: Operation,
    reply: oneshot::Sender<ResponseFrame>,
}

/// Request/response exchanges with correlation ids and timeouts.
///
/// A response echoing a `requestId` goes to that request. A response without
/// one goes to the oldest pending request for the same operation.
pub struct RequestClient {
    transport: Rc<dyn Transport>,
    timer: Rc<dyn Timer>,
    timeout: Duration,
    next_id: Cell<RequestId>,
    pending: RefCell<Vec<Pending>>,
}

impl RequestClient {
    pub fn new(transport: Rc<dyn Transport>, timer: Rc<dyn Timer>, timeout: Duration) -> Self {
        Self {
            transport,
            timer,
            timeout,
            next_id: Cell::new(1),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Sends `exchange` and decodes a successful response.
    pub async fn request<E: Exchange>(&self, exchange: &E) -> Result<E::Response, RequestError> {
        let frame = self.exchange(exchange).await?;
        frame
            .into_result()
            .map_err(|err| RequestError::from_protocol(E::OPERATION, err))
    }

    /// Sends `exchange` and returns the raw response whatever its status.
    pub async fn exchange<E: Exchange>(&self, exchange: &E) -> Result<ResponseFrame, RequestError> {
        let operation = E::OPERATION;
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let text = RequestFrame::encode(id, exchange)
            .and_then(|frame| frame.to_json())
            .map_err(|err| RequestError::from_protocol(operation, err))?;

        let (reply, response) = oneshot::channel();
        self.pending.borrow_mut().push(Pending {
            id,
            operation,
            reply,
        });

        log::debug!("-> {operation} #{id}");
        if let Err(err) = self.transport.send(text) {
            self.retire(id);
            log::error!("{operation} #{id} could not be sent: {err}");
            return Err(err.into());
        }

        match future::select(response, self.timer.sleep(self.timeout)).await {
            Either::Left((Ok(frame), _)) => {
                log::debug!("<- {operation} #{id} {:?}", frame.status);
                Ok(frame)
            }
            Either::Left((Err(oneshot::Canceled), _)) => {
                log::warn!("{operation} #{id} cancelled");
                Err(RequestError::Cancelled(operation))
            }
            Either::Right(((), _)) => {
                self.retire(id);
                log::warn!("{operation} #{id} timed out after {:?}", self.timeout);
                Err(RequestError::Timeout(operation))
            }
        }
    }

    fn retire(&self, id: RequestId) {
        self.pending.borrow_mut().retain(|pending| pending.id != id);
    }

    /// Routes one incoming text frame to its pending request.
    pub fn handle_incoming(&self, text: &str) {
        let frame = match ResponseFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("Dropping unparsable frame: {err}");
                return;
            }
        };

        let pending = {
            let mut pending = self.pending.borrow_mut();
            let index = match frame.request_id {
                Some(id) => pending.iter().position(|p| p.id == id),
                None => pending.iter().position(|p| frame.is_for(p.operation)),
            };
            index.map(|index| pending.remove(index))
        };

        match pending {
            Some(pending) => {
                if !frame.is_for(pending.operation) {
                    log::warn!(
                        "#{} answered as {} but was sent as {}",
                        pending.id,
                        frame.operation,
                        pending.operation
                    );
                }
                if pending.reply.send(frame).is_err() {
                    log::debug!("#{} was abandoned before its response arrived", pending.id);
                }
            }
            None => log::warn!(
                "Dropping unmatched {} response (request id {:?})",
                frame.operation,
                frame.request_id
            ),
        }
    }

    /// Fails every outstanding request with [`RequestError::Cancelled`].
    pub fn cancel_all(&self) {
        let cancelled = std::mem::take(&mut *self.pending.borrow_mut());
        if !cancelled.is_empty() {
            log::warn!("Cancelling {} pending request(s)", cancelled.len());
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use mines_protocol::{Balance, GetBalance, RoundStart, RoundStarted};
    use serde_json::json;

    #[test]
    fn test_routes_by_request_id() {
        let mut harness = Harness::new();
        harness.server.hold(Operation::RoundStart);
        harness.server.hold(Operation::RoundStart);

        let client = Rc::clone(&harness.client);
        let first = harness.spawn(async move { client.request(&RoundStart::new("T")).await });
        let client = Rc::clone(&harness.client);
        let second = harness.spawn(async move { client.request(&RoundStart::new("T")).await });
        harness.run_until_stalled();

        let ids = harness.server.held_ids(Operation::RoundStart);
        assert_eq!(ids.len(), 2);
        // answer out of order
        harness.client.handle_incoming(
            &json!({"operation": "mines_round_start", "requestId": ids[1], "status": "200 OK", "roundId": "b"})
                .to_string(),
        );
        harness.client.handle_incoming(
            &json!({"operation": "mines_round_start", "requestId": ids[0], "status": "200 OK", "roundId": "a"})
                .to_string(),
        );
        harness.settle();

        assert_eq!(first.take(), Some(Ok(RoundStarted { round_id: "a".into() })));
        assert_eq!(second.take(), Some(Ok(RoundStarted { round_id: "b".into() })));
    }

    #[test]
    fn test_legacy_response_goes_to_oldest() {
        let mut harness = Harness::new();
        harness.server.hold(Operation::GetBalance);
        harness.server.hold(Operation::GetBalance);

        let client = Rc::clone(&harness.client);
        let first = harness.spawn(async move { client.request(&GetBalance).await });
        let client = Rc::clone(&harness.client);
        let second = harness.spawn(async move { client.request(&GetBalance).await });
        harness.run_until_stalled();

        for balance in [10, 20] {
            harness.client.handle_incoming(
                &json!({"operation": "getbalance", "status": "200 OK", "balance": balance}).to_string(),
            );
        }
        harness.settle();

        assert_eq!(first.take(), Some(Ok(Balance { balance: 10.0 })));
        assert_eq!(second.take(), Some(Ok(Balance { balance: 20.0 })));
    }

    #[test]
    fn test_rejection_and_unmatched() {
        let mut harness = Harness::new();
        harness
            .server
            .reply(Operation::GetBalance, Reply::Status("500", "down for maintenance"));

        harness.client.handle_incoming(r#"{"operation":"getbalance","requestId":99,"status":"200 OK"}"#);
        harness.client.handle_incoming("not json");

        let client = Rc::clone(&harness.client);
        let result = harness.spawn(async move { client.request(&GetBalance).await });
        harness.settle();

        let err = result.take().unwrap().unwrap_err();
        assert_eq!(err.status(), Some("500"));
        assert_eq!(
            err,
            RequestError::Rejected {
                operation: Operation::GetBalance,
                status: "500".into(),
                description: "down for maintenance".into(),
            }
        );
        assert_eq!(harness.client.pending_count(), 0);
    }

    #[test]
    fn test_timeout_retires_request() {
        let mut harness = Harness::new();
        harness.server.hold(Operation::GetBalance);

        let client = Rc::clone(&harness.client);
        let result = harness.spawn(async move { client.request(&GetBalance).await });
        harness.settle();

        assert_eq!(result.take(), Some(Err(RequestError::Timeout(Operation::GetBalance))));
        assert_eq!(harness.client.pending_count(), 0);
        assert_eq!(harness.timer.now(), ClientConfig::default().request_timeout());

        // a late answer is dropped
        let id = harness.server.held_ids(Operation::GetBalance)[0];
        harness.client.handle_incoming(
            &json!({"operation": "getbalance", "requestId": id, "status": "200 OK", "balance": 1}).to_string(),
        );
    }

    #[test]
    fn test_cancel_all() {
        let mut harness = Harness::new();
        harness.server.hold(Operation::GetBalance);

        let client = Rc::clone(&harness.client);
        let result = harness.spawn(async move { client.request(&GetBalance).await });
        harness.run_until_stalled();
        harness.client.cancel_all();
        harness.run_until_stalled();

        assert_eq!(result.take(), Some(Err(RequestError::Cancelled(Operation::GetBalance))));
    }

    #[test]
    fn test_send_failure() {
        let mut harness = Harness::new();
        harness.server.disconnect();

        let client = Rc::clone(&harness.client);
        let result = harness.spawn(async move { client.request(&GetBalance).await });
        harness.settle();

        assert_eq!(
            result.take(),
            Some(Err(RequestError::Transport(TransportError::Closed)))
        );
        assert_eq!(harness.client.pending_count(), 0);
    }
}
