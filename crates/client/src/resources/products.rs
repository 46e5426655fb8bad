use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vendorportal_core::validation::{validate_max_len, validate_text};
use vendorportal_core::{DomainError, DomainResult, ProductId, VendorId};

use crate::error::RequestError;
use crate::resources::{Acknowledgement, Page, Timestamp};
use crate::session::SessionManager;

const BASE: &str = "/api/products";

pub const PRODUCT_NAME_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    pub name: String,
    #[serde(default)]
    pub regular_price: Option<Decimal>,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    #[serde(default)]
    pub impressions: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub clinical_status_id: Option<i64>,
}

impl Product {
    /// Sale price when set, otherwise the regular price.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.sale_price.or(self.regular_price)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub success: bool,
    pub total_products: u64,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub success: bool,
    pub total_count: u64,
    pub current_count: u64,
    pub limit: u32,
    pub offset: u32,
    pub products: Vec<Product>,
}

impl ProductPage {
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + self.current_count < self.total_count
    }
}

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    product: Product,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub regular_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_status_id: Option<i64>,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        validate_text("name", &self.name, PRODUCT_NAME_MAX)?;
        validate_max_len("description", self.description.as_deref(), DESCRIPTION_MAX)?;
        validate_pricing(Some(self.regular_price), self.sale_price, self.discount_percentage)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl ProductUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            validate_text("name", name, PRODUCT_NAME_MAX)?;
        }
        validate_max_len("description", self.description.as_deref(), DESCRIPTION_MAX)?;
        validate_pricing(self.regular_price, self.sale_price, self.discount_percentage)
    }
}

fn validate_pricing(
    regular: Option<Decimal>,
    sale: Option<Decimal>,
    discount: Option<Decimal>,
) -> DomainResult<()> {
    for (field, value) in [("regular_price", regular), ("sale_price", sale)] {
        if value.is_some_and(|v| v < Decimal::ZERO) {
            return Err(DomainError::validation(format!("{field} must not be negative")));
        }
    }
    if let (Some(regular), Some(sale)) = (regular, sale) {
        if sale > regular {
            return Err(DomainError::validation("sale_price must not exceed regular_price"));
        }
    }
    if let Some(discount) = discount {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(DomainError::validation("discount_percentage must be between 0 and 100"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct Products<'a> {
    session: &'a SessionManager,
}

impl<'a> Products<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn list(&self) -> Result<ProductList, RequestError> {
        self.session.get(BASE).await
    }

    pub async fn page(&self, page: Page) -> Result<ProductPage, RequestError> {
        self.session
            .execute(Method::GET, &format!("{BASE}/paginated"), |req| req.query(&page))
            .await
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, RequestError> {
        let envelope: ProductEnvelope = self.session.get(&format!("{BASE}/{id}")).await?;
        Ok(envelope.product)
    }

    pub async fn create(&self, product: &NewProduct) -> Result<Product, RequestError> {
        product.validate()?;
        let envelope: ProductEnvelope = self
            .session
            .execute(Method::POST, BASE, |req| req.json(product))
            .await?;
        Ok(envelope.product)
    }

    pub async fn update(&self, id: ProductId, update: &ProductUpdate) -> Result<Product, RequestError> {
        update.validate()?;
        let envelope: ProductEnvelope = self
            .session
            .execute(Method::PUT, &format!("{BASE}/{id}"), |req| req.json(update))
            .await?;
        Ok(envelope.product)
    }

    pub async fn delete(&self, id: ProductId) -> Result<Acknowledgement, RequestError> {
        self.session
            .execute(Method::DELETE, &format!("{BASE}/{id}"), |req| req)
            .await
    }
}
