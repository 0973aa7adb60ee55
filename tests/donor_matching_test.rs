// ==========================================
// 献血者匹配集成测试
// ==========================================
// 职责: 验证相容性过滤、排序、截断、资格过滤、招募通知
// ==========================================


#[cfg(test)]
mod donor_matching_test {
    use blood_bank_core::api::ApiError;
    use blood_bank_core::domain::donor::GeoPoint;
    use blood_bank_core::domain::types::{BloodType, MatchType};
    use blood_bank_core::engine::compatibility::can_donate_to;

    use chrono::NaiveDate;

    use crate::test_helpers::{day, execute_sql, new_donor, new_request, setup_env, TestEnv};

    fn origin() -> GeoPoint {
        GeoPoint::new(40.7128, -74.0060)
    }

    /// 登记一组献血者,返回 donor_id
    fn register(
        env: &TestEnv,
        name: &str,
        blood_type: &str,
        location: Option<GeoPoint>,
        last: Option<NaiveDate>,
    ) -> String {
        env.state
            .donor_api
            .register_donor(new_donor(name, blood_type, location, last), "registrar")
            .unwrap()
            .donor_id
    }

    fn seed_a_neg_pool(env: &TestEnv) {
        register(env, "Exact", "A-", Some(GeoPoint::new(42.0, -74.0060)), None);
        register(env, "Waiting", "A-", None, Some(day(-10)));
        register(env, "Near", "O-", Some(GeoPoint::new(40.7306, -73.9866)), Some(day(-90)));
        register(env, "Far", "O-", Some(GeoPoint::new(41.5, -74.0)), None);
        register(env, "NoLoc", "O-", None, None);
        register(env, "WrongA", "A+", Some(GeoPoint::new(40.72, -74.0)), None);
        register(env, "WrongB", "B-", Some(GeoPoint::new(40.72, -74.0)), None);
        let deferred = register(env, "Deferred", "O-", Some(GeoPoint::new(40.7128, -74.0)), None);
        env.state
            .donor_api
            .set_donor_eligibility(&deferred, false, Some("recent travel"), "registrar")
            .unwrap();
    }

    // ==========================================
    // 测试1: 相容性与排序
    // ==========================================

    #[test]
    fn test_match_returns_only_compatible_donors_in_rank_order() {
        let (env, _) = setup_env();
        seed_a_neg_pool(&env);

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("A-", Some(origin()), 4)
            .unwrap();
        assert!(!outcome.is_degraded());

        let names: Vec<&str> = outcome.donors.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(names, vec!["Exact", "Waiting", "Near", "Far", "NoLoc"]);

        for donor in &outcome.donors {
            assert!(can_donate_to(donor.blood_type, BloodType::ANeg));
        }

        assert_eq!(outcome.donors[0].match_type, MatchType::Exact);
        assert_eq!(outcome.donors[0].score, 100);
        assert_eq!(outcome.donors[2].match_type, MatchType::Compatible);
        assert_eq!(outcome.donors[2].score, 80);

        // 距离未知为 None,不是 0
        assert!(outcome.donors[1].distance_km.is_none());
        assert!(outcome.donors[4].distance_km.is_none());
        let near = outcome.donors[2].distance_km.unwrap();
        let far = outcome.donors[3].distance_km.unwrap();
        assert!(near < 5.0);
        assert!(far > near);

        // 间隔未满仍出现在结果中,但不可通知
        let waiting = &outcome.donors[1];
        assert!(!waiting.eligible_to_notify);
        assert_eq!(waiting.days_until_eligible, 46);
        assert!(waiting.match_reason.contains("WAIT"));
    }

    #[test]
    fn test_match_truncates_to_buffer_factor() {
        let (env, _) = setup_env();
        seed_a_neg_pool(&env);

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("A-", Some(origin()), 1)
            .unwrap();
        let names: Vec<&str> = outcome.donors.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(names, vec!["Exact", "Waiting"]);
    }

    #[test]
    fn test_without_location_older_donation_ranks_first() {
        let (env, _) = setup_env();
        register(&env, "Recent", "O-", None, Some(day(-100)));
        register(&env, "Older", "O-", None, Some(day(-200)));
        register(&env, "Never", "O-", None, None);

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("O-", None, 2)
            .unwrap();
        let names: Vec<&str> = outcome.donors.iter().map(|d| d.full_name.as_str()).collect();
        assert_eq!(names, vec!["Never", "Older", "Recent"]);
        assert!(outcome.donors.iter().all(|d| d.distance_km.is_none()));
        assert!(outcome.donors.iter().all(|d| d.eligible_to_notify));
    }

    #[test]
    fn test_no_candidates_is_empty_not_error() {
        let (env, _) = setup_env();
        register(&env, "OnlyAB", "AB+", None, None);

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("O-", None, 3)
            .unwrap();
        assert!(outcome.donors.is_empty());
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn test_storage_failure_degrades_to_flagged_empty_result() {
        let (env, _) = setup_env();
        seed_a_neg_pool(&env);

        execute_sql(&env.state, "ALTER TABLE donor_profile RENAME TO donor_profile_offline;");

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("A-", Some(origin()), 2)
            .unwrap();
        assert!(outcome.donors.is_empty());
        assert!(outcome.is_degraded());
        assert!(outcome.error.as_deref().unwrap().contains("donor_profile"));

        // 恢复后匹配照常
        execute_sql(&env.state, "ALTER TABLE donor_profile_offline RENAME TO donor_profile;");
        let outcome = env
            .state
            .matching_api
            .find_matching_donors("A-", Some(origin()), 2)
            .unwrap();
        assert!(!outcome.is_degraded());
        assert!(!outcome.donors.is_empty());
    }

    #[test]
    fn test_update_location_changes_ranking() {
        let (env, _) = setup_env();
        let a = register(&env, "Mover", "B+", None, None);
        register(&env, "Static", "B+", Some(GeoPoint::new(40.9, -74.0)), None);

        env.state
            .donor_api
            .update_donor_location(&a, Some(GeoPoint::new(40.713, -74.006)), "registrar")
            .unwrap();

        let outcome = env
            .state
            .matching_api
            .find_matching_donors("B+", Some(origin()), 1)
            .unwrap();
        assert_eq!(outcome.donors[0].full_name, "Mover");
    }

    #[test]
    fn test_match_input_validation() {
        let (env, _) = setup_env();
        let api = &env.state.matching_api;

        assert!(matches!(
            api.find_matching_donors("A-", Some(GeoPoint::new(123.0, 0.0)), 1),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            api.find_matching_donors("A-", None, 0),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            api.find_matching_donors("A", None, 1),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_register_donor_validation() {
        let (env, _) = setup_env();
        let api = &env.state.donor_api;

        assert!(matches!(
            api.register_donor(new_donor("Future", "A+", None, Some(day(1))), "registrar"),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            api.register_donor(new_donor("BadType", "C+", None, None), "registrar"),
            Err(ApiError::ValidationError(_))
        ));

        let id = register(&env, "Dee", "A+", None, None);
        assert!(matches!(
            api.set_donor_eligibility(&id, false, None, "registrar"),
            Err(ApiError::ValidationError(_))
        ));
    }

    // ==========================================
    // 测试2: 招募通知
    // ==========================================

    #[tokio::test]
    async fn test_notify_matching_donors_skips_interval_waiters() {
        let (env, recorder) = setup_env();
        seed_a_neg_pool(&env);

        let request = env
            .state
            .request_api
            .create_request(new_request("A-", 2, "critical"), "clerk")
            .unwrap();

        let summary = env
            .state
            .matching_api
            .notify_matching_donors(&request.request_id, Some(origin()), "coordinator")
            .await
            .unwrap();

        assert_eq!(summary.outcome.donors.len(), 4);
        assert_eq!(summary.notified, 3);
        assert_eq!(summary.skipped_not_eligible, 1);
        assert!(summary.report.as_ref().unwrap().delivered);

        let mut notified: Vec<String> = recorder.sent().into_iter().map(|(name, _)| name).collect();
        notified.sort();
        assert_eq!(notified, vec!["Exact", "Far", "Near"]);

        let actions = env
            .state
            .dashboard_api
            .list_actions_for_entity(&request.request_id)
            .unwrap();
        assert!(actions.iter().any(|a| a.action_type == "NotifyDonors"));
    }

    #[tokio::test]
    async fn test_notify_for_closed_request_is_rejected() {
        let (env, recorder) = setup_env();
        seed_a_neg_pool(&env);

        let request = env
            .state
            .request_api
            .create_request(new_request("A-", 1, "low"), "clerk")
            .unwrap();
        env.state
            .request_api
            .cancel_request(&request.request_id, None, "clerk")
            .unwrap();

        let result = env
            .state
            .matching_api
            .notify_matching_donors(&request.request_id, None, "coordinator")
            .await;
        assert!(matches!(result, Err(ApiError::ValidationError(_))));
        assert!(recorder.sent().is_empty());
    }
}
