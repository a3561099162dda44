//! Trip creation through the factory
//!
//! The salt binds a trip to its creator, its name and the moment it was
//! requested, so the same wallet can open several trips with one name.
//! The new contract's address comes from the mined receipt's logs; when
//! the node reports none, the address the factory returned from a
//! simulated call stands in.

use std::sync::Arc;

use chain::{abi, FactoryContract, TransactionWaiter, TxReceipt};
use common::{keccak256, lowercase_address, Address, JoinCode, Trip, B256};
use observability::FlowMetrics;
use tracing::{debug, info, warn};

use crate::error::SettlementError;
use crate::service::finish;
use crate::session::Session;
use crate::Result;

/// Salt for `createTrip`: Keccak-256 of `"<lowercase creator>:<name>:<unix millis>"`
pub fn trip_salt(creator: &Address, name: &str, timestamp_ms: i64) -> B256 {
    keccak256(format!("{}:{}:{}", lowercase_address(creator), name, timestamp_ms))
}

/// Trip deployed by the factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTrip {
    pub trip: Trip,
    pub salt: B256,
    pub receipt: TxReceipt,
}

/// Opens new trips through the factory contract
pub struct TripCreator {
    factory: Arc<dyn FactoryContract>,
    waiter: Arc<dyn TransactionWaiter>,
    chain_id: u64,
    metrics: FlowMetrics,
}

impl TripCreator {
    pub fn new(
        factory: Arc<dyn FactoryContract>,
        waiter: Arc<dyn TransactionWaiter>,
        chain_id: u64,
    ) -> Self {
        Self {
            factory,
            waiter,
            chain_id,
            metrics: FlowMetrics::new("create"),
        }
    }

    /// Deploy a trip named `name` with the connected wallet as creator
    pub async fn create_trip(&self, session: &Session, name: &str) -> Result<CreatedTrip> {
        self.create_trip_at(session, name, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// [`create_trip`](Self::create_trip) with an explicit request time
    pub async fn create_trip_at(
        &self,
        session: &Session,
        name: &str,
        timestamp_ms: i64,
    ) -> Result<CreatedTrip> {
        let mut flow = self.metrics.start();
        let result = self.run_create(session, name, timestamp_ms).await;
        finish(&mut flow, &result);
        result
    }

    async fn run_create(&self, session: &Session, name: &str, timestamp_ms: i64) -> Result<CreatedTrip> {
        let me = session.account()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SettlementError::EmptyTripName);
        }

        let salt = trip_salt(&me, name, timestamp_ms);
        let predicted = self.factory.predict_trip(me, salt).await?;
        debug!(caller = %me, %salt, %predicted, "Simulated createTrip");

        info!(caller = %me, trip = name, factory = %self.factory.address(), "Creating trip");
        let tx = self.factory.create_trip(me, salt).await?;
        let receipt = self.waiter.wait_for_receipt(tx).await?;

        let address = match abi::created_trip(&receipt.logs, self.factory.address()) {
            Some(address) => address,
            None => {
                warn!(tx = %tx, %predicted, "No trip address in receipt logs, using simulated result");
                predicted
            }
        };

        let trip = Trip::new(name, JoinCode::generate(), Some(me), address, self.chain_id);
        info!(tx = %tx, trip = %trip.address, code = %trip.code, "Trip created");

        Ok(CreatedTrip { trip, salt, receipt })
    }
}
