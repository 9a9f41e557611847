pub mod data {
    pub mod datasources {
        pub mod ad_datasource;
        pub mod auth_datasource;
        pub mod billing_gateway_datasource;
        pub mod entitlement_store_datasource;
        pub mod google_play_developer_api_datasource;
        pub mod receipt_verifier_datasource;
    }
    pub mod models {
        pub mod billing_gateway {
            pub mod purchase_model;
            pub mod subscription_product_model;
        }
        pub(crate) mod google_play_developer_api {
            pub(crate) mod subscription_purchase_v2_model;
        }
    }
    pub mod repositories {
        pub(crate) mod catalog_normalization;
        pub mod entitlement_repository_impl;
    }
}

pub mod domain {
    pub mod entities {
        pub mod entitlement;
        pub mod gate;
        pub mod plan;
        pub mod purchase_outcome;
    }
    pub mod repositories {
        pub mod entitlement_repository;
    }
}

pub mod ad_gate;
pub mod config;
pub(crate) mod constants;
pub mod errors;
pub mod tasks;
pub mod util;

#[cfg(test)]
mod test_support;
