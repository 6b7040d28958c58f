use std::rc::Rc;

use crate::*;

/// One mines table: the session, its server link and the round workflow,
/// wired to a board and a view.
pub struct MinesTable {
    config: ClientConfig,
    store: Rc<SessionStore>,
    client: Rc<RequestClient>,
    reveal: Rc<RevealEngine>,
    dispatcher: Rc<ActionDispatcher>,
    recovery: PendingRoundRecovery,
}

impl MinesTable {
    pub fn new(
        config: ClientConfig,
        transport: Rc<dyn Transport>,
        timer: Rc<dyn Timer>,
        board: Rc<dyn BoardView>,
        view: Rc<dyn ViewHooks>,
    ) -> Result<Self, StoreError> {
        Self::with_picker(config, transport, timer, board, view, Box::new(OsCellPicker))
    }

    pub fn with_picker(
        config: ClientConfig,
        transport: Rc<dyn Transport>,
        timer: Rc<dyn Timer>,
        board: Rc<dyn BoardView>,
        view: Rc<dyn ViewHooks>,
        picker: Box<dyn CellPicker>,
    ) -> Result<Self, StoreError> {
        let store = Rc::new(SessionStore::new(&config)?);
        let client = Rc::new(RequestClient::new(
            transport,
            Rc::clone(&timer),
            config.request_timeout(),
        ));
        let reveal = Rc::new(RevealEngine::new(board, Rc::clone(&timer), config.reveal_pacing));
        let dispatcher = Rc::new(ActionDispatcher::new(
            Rc::clone(&store),
            Rc::clone(&client),
            Rc::clone(&reveal),
            view,
            picker,
        ));
        let recovery = PendingRoundRecovery::new(
            Rc::clone(&store),
            Rc::clone(&client),
            Rc::clone(&reveal),
            timer,
            config.restore_settle(),
        );

        log::debug!("table {} ready", config.table_id);
        Ok(Self {
            config,
            store,
            client,
            reveal,
            dispatcher,
            recovery,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Rc<SessionStore> {
        &self.store
    }

    pub fn client(&self) -> &Rc<RequestClient> {
        &self.client
    }

    pub fn reveal(&self) -> &Rc<RevealEngine> {
        &self.reveal
    }

    pub fn dispatcher(&self) -> &Rc<ActionDispatcher> {
        &self.dispatcher
    }

    pub fn recovery(&self) -> &PendingRoundRecovery {
        &self.recovery
    }

    /// Feeds one text frame from the server into the request client.
    pub fn handle_incoming(&self, text: &str) {
        self.client.handle_incoming(text);
    }

    /// The server link is gone; every outstanding request fails.
    pub fn connection_lost(&self) {
        log::warn!("Connection to table {} lost", self.config.table_id);
        self.client.cancel_all();
    }

    /// Boot order: balance, then any pending round, which is resumed.
    ///
    /// A failed balance fetch is logged and the configured balance kept.
    pub async fn startup(&self) -> Result<RecoveryOutcome, RecoveryError> {
        if let Err(err) = self.dispatcher.refresh_balance().await {
            log::warn!("Could not fetch balance: {err}");
        }

        let outcome = self.recovery.recover().await?;
        if let RecoveryOutcome::Restored(round_id) = &outcome {
            self.dispatcher.resume_restored_round()?;
            log::info!("Resumed round {round_id}");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use mines_protocol::Operation;
    use serde_json::json;

    #[test]
    fn test_startup_without_pending_round() {
        let mut harness = Harness::new();
        harness
            .server
            .reply(Operation::GetBalance, Reply::Ok(json!({"balance": 50.0})));
        harness
            .server
            .reply(Operation::GameLoad, Reply::Status("400", "no game"));

        let table = harness.table();
        let result = harness.spawn(async move { table.startup().await });
        harness.settle();

        assert_eq!(result.take(), Some(Ok(RecoveryOutcome::NothingToRestore)));
        assert_eq!(harness.store.balance(), 50.0);
        assert_eq!(harness.server.sent(), vec![Operation::GetBalance, Operation::GameLoad]);
        assert_eq!(harness.dispatcher().phase(), RoundPhase::Idle);
        assert!(harness.log.views().is_empty());
    }

    #[test]
    fn test_startup_resumes_round() {
        let mut harness = Harness::new();
        harness
            .server
            .reply(Operation::GetBalance, Reply::Status("500", "wallet down"));
        harness.server.reply(
            Operation::GameLoad,
            Reply::Ok(json!({
                "hasExistingGame": true,
                "roundId": "r-9",
                "gridOption": "3x3",
                "currentWinning": 1.2,
                "betAmount": 1.0,
                "mineCount": 1,
                "revealedMatrix": [["DIAMOND"]],
                "revealedCount": 1,
            })),
        );
        harness.server.reply(
            Operation::RoundEnd,
            Reply::Ok(json!({"revealedMatrix": [["DIAMOND", "MINE"]], "balance": 1001.2})),
        );

        let table = harness.table();
        let result = harness.spawn(async move {
            let outcome = table.startup().await?;
            table.dispatcher().cash_out().await?;
            Ok::<_, anyhow::Error>(outcome)
        });
        harness.settle();

        assert_eq!(
            result.take().map(|r| r.map_err(|err| err.to_string())),
            Some(Ok(RecoveryOutcome::Restored("r-9".into())))
        );
        assert_eq!(harness.store.balance(), 1001.2);
        assert!(!harness.store.is_started());
        let views = harness.log.views();
        assert_eq!(
            &views[..5],
            &[
                ViewUpdate::HideBet,
                ViewUpdate::Disable(Control::Settings),
                ViewUpdate::ShowGameControls,
                ViewUpdate::Enable(Control::Grid),
                ViewUpdate::Enable(Control::PickRandom),
            ]
        );
        assert_eq!(views[5], ViewUpdate::Enable(Control::Cashout));
        assert!(views.contains(&ViewUpdate::ShowWin(1.2)));
        assert_eq!(
            harness.board.shown(),
            vec![
                (Cell::new(0, 0), CellVisual::Diamond),
                (Cell::new(0, 1), CellVisual::StaticMine),
            ]
        );
    }

    #[test]
    fn test_connection_lost_cancels_requests() {
        let mut harness = Harness::new();
        harness.server.hold(Operation::GetBalance);

        let table = harness.table();
        let dispatcher = harness.dispatcher();
        let result = harness.spawn(async move { dispatcher.refresh_balance().await });
        harness.run_until_stalled();
        table.connection_lost();
        harness.run_until_stalled();

        assert_eq!(
            result.take(),
            Some(Err(DispatchError::Request(RequestError::Cancelled(
                Operation::GetBalance
            ))))
        );
    }
}
