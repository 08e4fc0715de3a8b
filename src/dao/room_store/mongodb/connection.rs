//! Opening the room database, with a bounded wait for the server to come up.

use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Pings tried before a connect gives up and leaves retrying to the supervisor.
const CONNECT_ATTEMPTS: u32 = 10;
const FIRST_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(5);

/// Wait before ping number `attempt + 1`, doubling from the first delay.
fn ping_delay(attempt: u32) -> Duration {
    FIRST_PING_DELAY
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_PING_DELAY)
}

/// Build a client for `config` and wait until the room database answers a ping.
pub async fn open_room_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                info!(database = %config.database_name, attempt, "room database reachable");
                return Ok((client, database));
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                let delay = ping_delay(attempt);
                debug!(attempt, ?delay, error = %err, "room database not reachable yet");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_delay_doubles_up_to_the_cap() {
        assert_eq!(ping_delay(1), Duration::from_millis(250));
        assert_eq!(ping_delay(2), Duration::from_millis(500));
        assert_eq!(ping_delay(3), Duration::from_secs(1));
        assert_eq!(ping_delay(5), Duration::from_secs(4));
        assert_eq!(ping_delay(6), MAX_PING_DELAY);
        assert_eq!(ping_delay(40), MAX_PING_DELAY);
    }
}
