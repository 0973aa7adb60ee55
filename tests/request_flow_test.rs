// ==========================================
// 用血申请流程集成测试
// ==========================================
// 职责: 验证审批扣减、状态机、乐观锁、并发审批、通知失败隔离
// ==========================================


#[cfg(test)]
mod request_flow_test {
    use std::sync::Arc;
    use std::thread;

    use blood_bank_core::api::ApiError;
    use blood_bank_core::domain::types::{BloodType, RequestStatus, UrgencyLevel};

    use crate::test_helpers::{
        day, execute_sql, new_request, seed_batch, setup_env, setup_env_with,
        FailingNotificationService,
    };

    // ==========================================
    // 测试1: 审批扣减
    // ==========================================

    #[tokio::test]
    async fn test_approve_deducts_inventory_and_notifies_hospital() {
        let (env, recorder) = setup_env();
        let state = &env.state;

        seed_batch(state, BloodType::APos, 2, day(2));
        seed_batch(state, BloodType::APos, 5, day(10));

        let request = state
            .request_api
            .create_request(new_request("A+", 3, "high"), "clerk")
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.revision, 0);

        let outcome = state
            .request_api
            .approve_request(&request.request_id, Some(0), "supervisor")
            .await
            .unwrap();

        assert_eq!(outcome.request.status, RequestStatus::Approved);
        assert_eq!(outcome.request.revision, 1);
        assert_eq!(outcome.receipt.total_deducted(), 3);
        assert_eq!(state.inventory_api.available_units("A+").unwrap(), 4);

        let forecast = outcome.forecast.expect("审批后应重算预测");
        assert_eq!(forecast.current_stock, 4);
        assert_eq!(forecast.short_term_demand, 3);

        let report = outcome.notification.expect("有联系邮箱时应通知医院");
        assert!(report.delivered);
        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "St. Mary Hospital");

        let stored = state.request_api.get_request(&request.request_id).unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);

        let actions = state
            .dashboard_api
            .list_actions_for_entity(&request.request_id)
            .unwrap();
        let kinds: Vec<&str> = actions.iter().map(|a| a.action_type.as_str()).collect();
        assert!(kinds.contains(&"CreateRequest"));
        assert!(kinds.contains(&"ApproveRequest"));
    }

    // ==========================================
    // 测试2: 库存不足时申请保持待审批
    // ==========================================

    #[tokio::test]
    async fn test_approve_with_insufficient_stock_keeps_request_pending() {
        let (env, recorder) = setup_env();
        let state = &env.state;

        seed_batch(state, BloodType::ONeg, 3, day(5));
        let request = state
            .request_api
            .create_request(new_request("O-", 5, "critical"), "clerk")
            .unwrap();

        let err = state
            .request_api
            .approve_request(&request.request_id, None, "supervisor")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            }
        ));

        let stored = state.request_api.get_request(&request.request_id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.revision, 0);
        assert_eq!(state.inventory_api.available_units("O-").unwrap(), 3);
        assert!(recorder.sent().is_empty());

        // 需求 5 > 库存 3
        let forecast = state.dashboard_api.get_forecast("O-").unwrap().unwrap();
        assert_eq!(forecast.urgency_level, UrgencyLevel::High);
    }

    #[tokio::test]
    async fn test_storage_failure_during_approval_rolls_back() {
        let (env, recorder) = setup_env();
        let state = &env.state;

        seed_batch(state, BloodType::BNeg, 4, day(6));
        let request = state
            .request_api
            .create_request(new_request("B-", 3, "high"), "clerk")
            .unwrap();

        // 审计日志写入失败发生在扣减与状态更新之后
        execute_sql(state, "ALTER TABLE action_log RENAME TO action_log_offline;");

        let err = state
            .request_api
            .approve_request(&request.request_id, None, "supervisor")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::DependencyFailure {
                unconfirmed: true,
                ..
            }
        ));
        assert!(err.is_retry_safe_after_recheck());
        assert!(recorder.sent().is_empty());

        execute_sql(state, "ALTER TABLE action_log_offline RENAME TO action_log;");

        let stored = state.request_api.get_request(&request.request_id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.revision, 0);
        assert_eq!(state.inventory_api.available_units("B-").unwrap(), 4);

        // 故障排除后重试成功
        let outcome = state
            .request_api
            .approve_request(&request.request_id, Some(0), "supervisor")
            .await
            .unwrap();
        assert_eq!(outcome.request.status, RequestStatus::Approved);
        assert_eq!(state.inventory_api.available_units("B-").unwrap(), 1);
    }

    // ==========================================
    // 测试3: 状态机
    // ==========================================

    #[tokio::test]
    async fn test_request_state_machine() {
        let (env, _) = setup_env();
        let state = &env.state;
        seed_batch(state, BloodType::BPos, 10, day(20));

        let approved = state
            .request_api
            .create_request(new_request("B+", 2, "medium"), "clerk")
            .unwrap();
        state
            .request_api
            .approve_request(&approved.request_id, None, "supervisor")
            .await
            .unwrap();

        // 已批准的申请不能再批准/驳回/撤销
        assert!(matches!(
            state
                .request_api
                .approve_request(&approved.request_id, None, "supervisor")
                .await,
            Err(ApiError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            state
                .request_api
                .reject_request(&approved.request_id, Some("late"), "supervisor")
                .await,
            Err(ApiError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            state
                .request_api
                .cancel_request(&approved.request_id, None, "clerk"),
            Err(ApiError::InvalidStateTransition { .. })
        ));

        let fulfilled = state
            .request_api
            .fulfill_request(&approved.request_id, "courier")
            .unwrap();
        assert_eq!(fulfilled.status, RequestStatus::Fulfilled);
        assert_eq!(fulfilled.revision, 2);

        // 待审批的申请不能直接完成
        let pending = state
            .request_api
            .create_request(new_request("B+", 1, "low"), "clerk")
            .unwrap();
        assert!(matches!(
            state.request_api.fulfill_request(&pending.request_id, "courier"),
            Err(ApiError::InvalidStateTransition { .. })
        ));

        let cancelled = state
            .request_api
            .cancel_request(&pending.request_id, Some("duplicate"), "clerk")
            .unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);

        let rejected_target = state
            .request_api
            .create_request(new_request("B+", 1, "low"), "clerk")
            .unwrap();
        let rejected = state
            .request_api
            .reject_request(&rejected_target.request_id, Some("no indication"), "supervisor")
            .await
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);

        // 只有一次审批扣减
        assert_eq!(state.inventory_api.available_units("B+").unwrap(), 8);

        let pending_list = state.request_api.list_requests(Some("pending")).unwrap();
        assert!(pending_list.is_empty());
        assert_eq!(state.request_api.list_requests(None).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let (env, _) = setup_env();
        let result = env
            .state
            .request_api
            .approve_request("missing", None, "supervisor")
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    // ==========================================
    // 测试4: 乐观锁
    // ==========================================

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let (env, _) = setup_env();
        let state = &env.state;
        seed_batch(state, BloodType::ABNeg, 4, day(9));

        let request = state
            .request_api
            .create_request(new_request("AB-", 1, "high"), "clerk")
            .unwrap();

        let err = state
            .request_api
            .approve_request(&request.request_id, Some(7), "supervisor")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ConcurrentModification(_)));
        assert!(err.is_retry_safe_after_recheck());
        assert_eq!(state.inventory_api.available_units("AB-").unwrap(), 4);
    }

    // ==========================================
    // 测试5: 并发审批不超扣
    // ==========================================

    #[test]
    fn test_concurrent_approvals_never_overdraw() {
        let (env, _) = setup_env();
        let state = &env.state;

        seed_batch(state, BloodType::OPos, 2, day(3));
        seed_batch(state, BloodType::OPos, 3, day(6));

        let ids: Vec<String> = (0..4)
            .map(|_| {
                state
                    .request_api
                    .create_request(new_request("O+", 2, "high"), "clerk")
                    .unwrap()
                    .request_id
            })
            .collect();

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let api = Arc::clone(&state.request_api);
                thread::spawn(move || {
                    futures::executor::block_on(api.approve_request(&id, None, "supervisor"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let approved = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(ApiError::InsufficientStock { .. })))
            .count();

        assert_eq!(approved, 2);
        assert_eq!(short, 2);
        assert_eq!(state.inventory_api.available_units("O+").unwrap(), 1);

        let approved_rows = state.request_api.list_requests(Some("APPROVED")).unwrap();
        assert_eq!(approved_rows.len(), 2);
    }

    // ==========================================
    // 测试6: 通知失败不影响台账
    // ==========================================

    #[tokio::test]
    async fn test_notification_failure_does_not_roll_back_approval() {
        let env = setup_env_with(Arc::new(FailingNotificationService));
        let state = &env.state;

        seed_batch(state, BloodType::ANeg, 6, day(4));
        let request = state
            .request_api
            .create_request(new_request("A-", 2, "critical"), "clerk")
            .unwrap();

        let outcome = state
            .request_api
            .approve_request(&request.request_id, None, "supervisor")
            .await
            .unwrap();

        let report = outcome.notification.unwrap();
        assert!(!report.delivered);
        assert!(report.error.is_some());

        assert_eq!(outcome.request.status, RequestStatus::Approved);
        assert_eq!(state.inventory_api.available_units("A-").unwrap(), 4);
    }

    // ==========================================
    // 测试7: 输入校验
    // ==========================================

    #[test]
    fn test_create_request_validation() {
        let (env, _) = setup_env();
        let api = &env.state.request_api;

        for (bt, units, priority) in [
            ("A+", 0, "high"),
            ("A+", 101, "high"),
            ("Q+", 1, "high"),
            ("A+", 1, "urgent"),
            ("A+", 1, "normal"),
        ] {
            let result = api.create_request(new_request(bt, units, priority), "clerk");
            assert!(
                matches!(result, Err(ApiError::ValidationError(_))),
                "{} {} {} 应被拒绝",
                bt,
                units,
                priority
            );
        }

        let mut blank = new_request("A+", 1, "low");
        blank.hospital_name = "   ".to_string();
        assert!(matches!(
            api.create_request(blank, "clerk"),
            Err(ApiError::ValidationError(_))
        ));

        assert!(api.list_requests(None).unwrap().is_empty());
    }
}
