pub mod order_orchestrator;
