//! Development fixtures: fills an empty user table with mock accounts.

use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::users::{count_users, insert_user, NewUser};
use crate::error::Result;

/// Inserts `count` mock users when the table is empty. Returns how many
/// were inserted.
pub async fn seed_mock_users(pool: &SqlitePool, count: usize) -> Result<usize> {
    if count_users(pool).await? > 0 {
        return Ok(0);
    }
    let users: Vec<NewUser> = {
        let mut rng = rand::thread_rng();
        (1..=count).map(|i| mock_user(i, &mut rng)).collect()
    };
    for user in &users {
        insert_user(pool, user).await?;
    }
    info!(event = "SEED", count, "Inserted {count} mock users");
    Ok(count)
}

fn mock_user<R: Rng + ?Sized>(i: usize, rng: &mut R) -> NewUser {
    NewUser {
        username: format!("user{i}"),
        full_name: Some(format!("Người dùng {i}")),
        email: Some(format!("user{i}@example.com")),
        phone: Some(format!("09{}", rng.gen_range(10_000_000..100_000_000u32))),
        balance_available: 0,
        active: rng.gen_bool(0.8),
        bet_locked: rng.gen_bool(0.2),
        withdraw_locked: rng.gen_bool(0.3),
        verified: rng.gen_bool(0.7),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{insert_user, new_user};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn mock_user_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let user = mock_user(3, &mut rng);
        assert_eq!(user.username, "user3");
        assert_eq!(user.email.as_deref(), Some("user3@example.com"));
        let phone = user.phone.unwrap();
        assert_eq!(phone.len(), 10);
        assert!(phone.starts_with("09"));
        assert!(phone.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn flags_follow_their_odds() {
        let mut rng = StdRng::seed_from_u64(11);
        let users: Vec<NewUser> = (1..=2_000).map(|i| mock_user(i, &mut rng)).collect();
        let share = |f: fn(&NewUser) -> bool| users.iter().filter(|u| f(u)).count() as f64 / 2_000.0;
        assert!((share(|u| u.active) - 0.8).abs() < 0.05);
        assert!((share(|u| u.bet_locked) - 0.2).abs() < 0.05);
        assert!((share(|u| u.withdraw_locked) - 0.3).abs() < 0.05);
        assert!((share(|u| u.verified) - 0.7).abs() < 0.05);
    }

    #[tokio::test]
    async fn seeds_only_an_empty_table() {
        let pool = test_pool().await;
        assert_eq!(seed_mock_users(&pool, 10).await.unwrap(), 10);
        assert_eq!(count_users(&pool).await.unwrap(), 10);
        assert_eq!(seed_mock_users(&pool, 10).await.unwrap(), 0);

        let other = test_pool().await;
        insert_user(&other, &new_user("real")).await.unwrap();
        assert_eq!(seed_mock_users(&other, 10).await.unwrap(), 0);
    }
}
