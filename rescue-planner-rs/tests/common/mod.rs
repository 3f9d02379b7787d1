//! Shared test doubles

use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use service_sdk::{Method, ServiceCaller};

mock! {
    pub Caller {}

    #[async_trait]
    impl ServiceCaller for Caller {
        async fn call(
            &self,
            service: &str,
            path: &str,
            method: Method,
            body: Option<Value>,
            timeout: Option<Duration>,
        ) -> service_sdk::Result<Value>;
    }
}
