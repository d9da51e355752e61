use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

fn default_cashback() -> f64 {
    100.0
}

fn default_active() -> bool {
    true
}

/// Distinguish an absent field (None) from an explicit null (Some(None)).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub cashback_amount: f64,
    /// Source for the code prefix (see `codes::prefix_for`)
    pub sku_prefix: Option<String>,
    /// Platform name -> listing URL (amazon, flipkart, website, ...)
    pub marketplace_urls: BTreeMap<String, String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public projection returned by code resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductView {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub cashback_amount: f64,
    pub marketplace_urls: BTreeMap<String, String>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            company_id: p.company_id,
            name: p.name,
            description: p.description,
            image_url: p.image_url,
            category: p.category,
            cashback_amount: p.cashback_amount,
            marketplace_urls: p.marketplace_urls,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub company_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_cashback")]
    pub cashback_amount: f64,
    #[serde(default)]
    pub sku_prefix: Option<String>,
    #[serde(default)]
    pub marketplace_urls: BTreeMap<String, String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub cashback_amount: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub sku_prefix: Option<Option<String>>,
    pub marketplace_urls: Option<BTreeMap<String, String>>,
    pub is_active: Option<bool>,
}
