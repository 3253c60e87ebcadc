use crate::error::EngineError;
use smol_str::SmolStr;
use std::collections::HashMap;
use tempo_execution::order::OrderId;

/// `order.id -> (strategy index, broker key)`, populated on `submit_order` and consulted on
/// every execution emitted by any broker (SPEC_FULL.md §4.L).
///
/// Same-time executions for multiple strategies are routed only to their owning strategy: this is
/// the load-bearing invariant behind the "multi-strategy isolation" testable property (SPEC_FULL.md
/// §8, property 3).
#[derive(Debug, Default)]
pub struct RoutingRegistry {
    routes: HashMap<OrderId, (usize, SmolStr)>,
}

impl RoutingRegistry {
    pub fn record(&mut self, order_id: OrderId, strategy_index: usize, broker_key: &str) {
        self.routes.insert(order_id, (strategy_index, SmolStr::new(broker_key)));
    }

    pub fn owner_of(&self, order_id: OrderId) -> Result<(usize, &str), EngineError> {
        self.routes
            .get(&order_id)
            .map(|(index, key)| (*index, key.as_str()))
            .ok_or_else(|| EngineError::Validation(format!("no routing entry for order {order_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_looks_up_owner() {
        let mut registry = RoutingRegistry::default();
        registry.record(OrderId(1), 0, "sim");

        let (strategy_index, broker_key) = registry.owner_of(OrderId(1)).unwrap();
        assert_eq!(strategy_index, 0);
        assert_eq!(broker_key, "sim");
    }

    #[test]
    fn unknown_order_errors() {
        let registry = RoutingRegistry::default();
        assert!(registry.owner_of(OrderId(99)).is_err());
    }
}
