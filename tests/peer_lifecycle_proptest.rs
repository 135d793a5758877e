//! Property-based tests for peer-session enrollment, rewards and refunds

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use crosslearn::shared::peer::{
    NewPeerSession, PeerSession, RatingSummary, SessionStatus, COINS_PER_STUDENT, MAX_STUDENTS_LIMIT,
};

fn open(max_students: i32) -> PeerSession {
    let request = NewPeerSession {
        title: "Fractions".to_string(),
        topic: "Maths".to_string(),
        description: None,
        max_students,
        scheduled_at: None,
    };
    PeerSession::open(Uuid::new_v4(), &request, 90.0, Utc::now()).unwrap()
}

proptest! {
    #[test]
    fn test_enrollment_never_exceeds_capacity(max in 1..=MAX_STUDENTS_LIMIT, attempts in 0usize..25) {
        let mut session = open(max);
        let mut accepted = 0usize;
        for _ in 0..attempts {
            if session.enroll(Uuid::new_v4(), Utc::now()).is_ok() {
                accepted += 1;
            }
        }
        prop_assert!(session.enrolled_count() <= max as usize);
        prop_assert_eq!(accepted, attempts.min(max as usize));
        if accepted > 0 {
            prop_assert_eq!(session.status, SessionStatus::Active);
        } else {
            prop_assert_eq!(session.status, SessionStatus::Waiting);
        }
    }

    #[test]
    fn test_reward_is_per_enrolled_student(max in 1..=MAX_STUDENTS_LIMIT, students in 1usize..=10) {
        let mut session = open(max);
        let teacher = session.teacher_user_id;
        for _ in 0..students {
            let _ = session.enroll(Uuid::new_v4(), Utc::now());
        }
        let coins = session.end(teacher, Utc::now()).unwrap();
        prop_assert_eq!(coins, session.enrolled_count() as i32 * COINS_PER_STUDENT);
        prop_assert_eq!(session.coins_earned, coins);
        prop_assert_eq!(session.status, SessionStatus::Completed);
        prop_assert!(session.end(teacher, Utc::now()).is_err());
    }

    #[test]
    fn test_refund_never_goes_negative(earned in 0i32..=100, balance in 0i32..=1000) {
        let mut session = open(5);
        session.coins_earned = earned;
        let refunded = session.refunded_balance(balance);
        prop_assert!(refunded >= 0);
        prop_assert_eq!(refunded, (balance - earned).max(0));
    }

    #[test]
    fn test_out_of_range_capacity_rejected(max in prop_oneof![-5i32..=0, (MAX_STUDENTS_LIMIT + 1)..50]) {
        let request = NewPeerSession {
            title: "t".to_string(),
            topic: "t".to_string(),
            description: None,
            max_students: max,
            scheduled_at: None,
        };
        prop_assert!(PeerSession::open(Uuid::new_v4(), &request, 95.0, Utc::now()).is_err());
    }

    #[test]
    fn test_rating_summary_bounds(ratings in proptest::collection::vec((1i32..=5, any::<bool>()), 0..20)) {
        let summary = RatingSummary::from_ratings(ratings.iter().copied());
        prop_assert_eq!(summary.total_ratings as usize, ratings.len());
        prop_assert_eq!(summary.upvotes as usize, ratings.iter().filter(|(_, up)| *up).count());
        if ratings.is_empty() {
            prop_assert_eq!(summary.average_rating, 0.0);
        } else {
            prop_assert!((1.0..=5.0).contains(&summary.average_rating));
        }
    }
}
