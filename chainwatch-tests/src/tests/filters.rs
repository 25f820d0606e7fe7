#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chainwatch::filters::{ProcessedLogs, TokenCreatedFilter, TokenTransferFilter};
    use chainwatch::poller::FilterOutcome;
    use chainwatch::{
        Chain, CursorKey, CursorRepo, LogFilter, MemoryRepo, NotificationKind, NotificationRepo,
        PollReport, Poller, PollerConfig, StartBlock,
    };
    use ethers::types::{Filter, ValueOrArray, U256};

    use crate::factory::{
        address, token_created_log, token_transfer_log, StubProvider, CREATOR_WALLET,
        RECIPIENT_WALLET, SENDER_WALLET, TOKEN_ADDRESS, TOKEN_FACTORY_ADDRESS,
    };
    use crate::provider_with_filter_stubber;
    use crate::test_runner;

    const SENDER_ID: i64 = 7;
    const CREATOR_ID: i64 = 11;

    fn poller(
        provider: Arc<StubProvider>,
        repo: Arc<MemoryRepo>,
        filter: Arc<dyn LogFilter>,
    ) -> Poller<MemoryRepo> {
        Poller::new(Chain::new("mainnet", "http://localhost:8545"), provider, repo)
            .add_filter(filter)
            .with_config(PollerConfig {
                max_block_range: 500,
                start_block: StartBlock::Genesis,
            })
    }

    fn get_processed(report: &PollReport, filter_name: &str) -> ProcessedLogs {
        match report.get_outcome(filter_name) {
            Some(FilterOutcome::Scanned { processed, .. }) => *processed,
            outcome => panic!("unexpected outcome {outcome:?}"),
        }
    }

    fn transfer(amount: u64, block_number: u64, log_index: u64) -> ethers::types::Log {
        token_transfer_log(
            TOKEN_ADDRESS,
            SENDER_WALLET,
            RECIPIENT_WALLET,
            U256::from(amount),
            block_number,
            log_index,
        )
    }

    #[tokio::test]
    pub async fn ignores_transfers_from_unknown_wallets() {
        let repo = test_runner::new_memory_repo();
        let provider = Arc::new(StubProvider::new(100).with_logs(vec![transfer(1_500_000, 10, 0)]));
        provider.set_decimals(address(TOKEN_ADDRESS), 6);
        let filter = TokenTransferFilter::new().unwrap();
        let poller = poller(provider.clone(), repo.clone(), Arc::new(filter));

        let report = poller.poll().await.unwrap();

        assert!(repo.get_all_notifications().await.is_empty());
        assert_eq!(
            get_processed(&report, TokenTransferFilter::NAME),
            ProcessedLogs { handled: 1, failed: 0 }
        );
        assert_eq!(provider.get_decimals_calls(), 0);
    }

    #[tokio::test]
    pub async fn notifies_sender_with_human_readable_amount() {
        let repo = test_runner::new_memory_repo();
        repo.add_user_wallet(&SENDER_WALLET.replace("70997970c", "70997970C"), SENDER_ID).await;
        let provider = Arc::new(
            StubProvider::new(100)
                .with_logs(vec![transfer(1_500_000, 10, 0), transfer(250_000, 11, 2)]),
        );
        provider.set_decimals(address(TOKEN_ADDRESS), 6);
        let filter = TokenTransferFilter::new().unwrap();
        let poller = poller(provider.clone(), repo.clone(), Arc::new(filter));

        poller.poll().await.unwrap();

        let notifications = repo.get_notifications(SENDER_ID).await.unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].kind, NotificationKind::TokenTransfer.to_string());
        assert_eq!(notifications[0].data["amount"], "1.5");
        assert_eq!(notifications[0].data["to"], RECIPIENT_WALLET);
        assert_eq!(notifications[0].data["tokenAddress"], TOKEN_ADDRESS);
        assert_eq!(notifications[1].data["amount"], "0.25");
        assert_eq!(provider.get_decimals_calls(), 1);
    }

    #[tokio::test]
    pub async fn fails_only_the_log_whose_token_decimals_are_unavailable() {
        let repo = test_runner::new_memory_repo();
        repo.add_user_wallet(SENDER_WALLET, SENDER_ID).await;
        let provider = Arc::new(StubProvider::new(100).with_logs(vec![transfer(1, 10, 0)]));
        let poller = poller(provider, repo.clone(), Arc::new(TokenTransferFilter::new().unwrap()));

        let report = poller.poll().await.unwrap();

        assert_eq!(get_processed(&report, TokenTransferFilter::NAME).failed, 1);
        assert!(repo.get_all_notifications().await.is_empty());
    }

    #[tokio::test]
    pub async fn creates_no_duplicate_notifications_when_a_range_is_rescanned() {
        let repo = test_runner::new_memory_repo();
        repo.add_user_wallet(SENDER_WALLET, SENDER_ID).await;
        let provider = Arc::new(StubProvider::new(100).with_logs(vec![transfer(1_000_000, 10, 0)]));
        provider.set_decimals(address(TOKEN_ADDRESS), 6);
        let filter: Arc<dyn LogFilter> = Arc::new(TokenTransferFilter::new().unwrap());

        let poller = poller(provider, repo.clone(), filter);

        poller.poll().await.unwrap();
        repo.reset_cursor(&CursorKey::new("mainnet", TokenTransferFilter::NAME), None)
            .await
            .unwrap();
        poller.poll().await.unwrap();

        let notifications = repo.get_notifications(SENDER_ID).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].data["amount"], "1");
    }

    #[tokio::test]
    pub async fn notifies_creator_of_new_tokens() {
        let repo = test_runner::new_memory_repo();
        repo.add_user_wallet(CREATOR_WALLET, CREATOR_ID).await;
        let provider = Arc::new(StubProvider::new(100).with_logs(vec![
            token_created_log(TOKEN_ADDRESS, CREATOR_WALLET, "Chain Watch", "CW", 50, 1),
            token_created_log(TOKEN_ADDRESS, SENDER_WALLET, "Someone Else", "SE", 51, 0),
        ]));
        let filter = TokenCreatedFilter::new()
            .unwrap()
            .with_factory_address(address(TOKEN_FACTORY_ADDRESS));
        let poller = poller(provider, repo.clone(), Arc::new(filter));

        poller.poll().await.unwrap();

        let notifications = repo.get_all_notifications().await;
        assert_eq!(notifications.len(), 1);
        let notification = &notifications[0];
        assert_eq!(notification.user_id, CREATOR_ID);
        assert_eq!(notification.kind, "TOKEN_CREATED");
        assert_eq!(notification.data["name"], "Chain Watch");
        assert_eq!(notification.data["symbol"], "CW");
        assert_eq!(notification.data["creator"], CREATOR_WALLET);
        assert_eq!(notification.data["tokenAddress"], TOKEN_ADDRESS);
        assert_eq!(notification.data["initialSupply"], U256::exp10(24).to_string());
    }

    #[tokio::test]
    pub async fn restricts_token_created_queries_to_the_factory() {
        let repo = test_runner::new_memory_repo();
        let filter = TokenCreatedFilter::new()
            .unwrap()
            .with_factory_address(address(TOKEN_FACTORY_ADDRESS));
        let poller = Poller::new(
            Chain::new("mainnet", "http://localhost:8545"),
            Arc::new(provider_with_filter_stubber!(100, |filter: &Filter| {
                assert_eq!(
                    filter.address,
                    Some(ValueOrArray::Value(crate::factory::address(
                        crate::factory::TOKEN_FACTORY_ADDRESS
                    )))
                );
            })),
            repo,
        )
        .add_filter(Arc::new(filter));

        poller.poll().await.unwrap();
    }
}
