//! Shared fixtures for the engine integration tests: a scriptable payment gateway, a small product catalog and
//! ready-wired APIs over the in-memory store.
#![allow(dead_code)]
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};

use duka_common::Money;
use tokio::sync::Notify;
use duka_engine::{
    catalog::ShippingTable,
    db_types::{
        NewOrder,
        NewOrderPayment,
        NewProductReview,
        Order,
        OrderId,
        OrderPayment,
        PaymentMethod,
        PaymentStatus,
        PaymentSummaryUpdate,
        ProductReview,
    },
    events::EventProducers,
    order_objects::{BalancePaymentRequest, CartLine, NewOrderRequest},
    traits::{
        GatewayError,
        GatewayOrder,
        GatewayOrderRequest,
        GatewaySettlement,
        GatewayTransactionStatus,
        OrderQueryFilter,
        OrderStore,
        OrderUpdate,
        PaymentGateway,
        Product,
        Promotion,
        StoreError,
    },
    MemoryStore,
    OrderFlowApi,
    PaymentFlowApi,
    StaticCatalog,
};

#[derive(Debug, Default)]
struct GatewayState {
    /// merchant reference and amount, keyed by tracking id
    orders: HashMap<String, (String, Money)>,
    settlements: HashMap<String, GatewaySettlement>,
    failing: bool,
}

/// An in-process payment gateway. Orders created on it stay `pending` until [`TestGateway::settle`] is called.
#[derive(Debug, Clone, Default)]
pub struct TestGateway {
    state: Arc<Mutex<GatewayState>>,
    create_calls: Arc<AtomicUsize>,
    status_calls: Arc<AtomicUsize>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails as if the gateway were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn settle(&self, tracking_id: &str, settlement: GatewaySettlement) {
        self.state.lock().unwrap().settlements.insert(tracking_id.to_string(), settlement);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// The tracking ids of every order created so far
    pub fn tracking_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().orders.keys().cloned().collect()
    }
}

impl PaymentGateway for TestGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(GatewayError::Request("connection refused".into()));
        }
        let tracking_id = format!("TRK-{:08x}", rand::random::<u32>());
        state.orders.insert(tracking_id.clone(), (request.merchant_reference.clone(), request.amount));
        Ok(GatewayOrder {
            redirect_url: format!("https://pay.example.com/checkout/{tracking_id}"),
            tracking_id,
            merchant_reference: request.merchant_reference,
        })
    }

    async fn transaction_status(&self, tracking_id: &str) -> Result<GatewayTransactionStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(GatewayError::Timeout);
        }
        let (reference, amount) = state
            .orders
            .get(tracking_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected { message: format!("Unknown tracking id {tracking_id}") })?;
        let status = state.settlements.get(tracking_id).copied().unwrap_or(GatewaySettlement::Pending);
        Ok(GatewayTransactionStatus {
            is_paid: status == GatewaySettlement::Completed,
            status,
            amount: Some(amount),
            merchant_reference: Some(reference),
            confirmation_code: (status == GatewaySettlement::Completed).then(|| "CONF-1".to_string()),
            description: None,
        })
    }
}

/// Three products: a 50,000 TZS dress, a 25,000 TZS kanga on "buy 2 get 1 free", and an out-of-stock bag.
/// Shipping is free for shop pickup, 5,000 to Dar es Salaam and 10,000 elsewhere.
pub fn sample_catalog() -> StaticCatalog {
    let products = vec![
        Product {
            id: "dress-01".into(),
            name: "Kitenge Dress".into(),
            price: Money::from_major_units(50_000),
            original_price: Some(Money::from_major_units(60_000)),
            promo: None,
            in_stock: true,
        },
        Product {
            id: "kanga-01".into(),
            name: "Kanga ya Pwani".into(),
            price: Money::from_major_units(25_000),
            original_price: None,
            promo: Some(Promotion { buy: 2, free: 1 }),
            in_stock: true,
        },
        Product {
            id: "bag-01".into(),
            name: "Ukili Bag".into(),
            price: Money::from_major_units(40_000),
            original_price: None,
            promo: None,
            in_stock: false,
        },
    ];
    let regions = HashMap::from([
        ("Dar es Salaam".to_string(), Money::from_major_units(5_000)),
        ("Pickup".to_string(), Money::ZERO),
    ]);
    StaticCatalog::new(products, ShippingTable { default: Money::from_major_units(10_000), regions })
}

/// A checkout request for two dresses collected from the shop, i.e. 100,000 TZS in total.
pub fn order_request(phone: &str, method: PaymentMethod) -> NewOrderRequest {
    NewOrderRequest {
        customer_name: "Amina Juma".into(),
        phone: phone.into(),
        region: "Pickup".into(),
        address: "Plot 12, Msasani".into(),
        items: vec![CartLine { product_id: "dress-01".into(), quantity: 2, size: Some("M".into()), color: None }],
        payment_method: Some(method),
        installment_enabled: false,
        deposit_amount: None,
        installment_notes: None,
    }
}

pub const PHONE: &str = "+255 653 670 590";

pub type TestApi<B> = OrderFlowApi<B, TestGateway, StaticCatalog>;

pub fn init_logging() {
    let _ = env_logger::try_init();
}

pub fn tzs(units: i64) -> Money {
    Money::from_major_units(units)
}

pub fn api_with<B: OrderStore>(db: B, gateway: &TestGateway, producers: EventProducers) -> TestApi<B> {
    let payments = PaymentFlowApi::new(db, Arc::new(gateway.clone()), producers)
        .with_callback_url("https://duka.example.com/payments/callback");
    OrderFlowApi::new(payments, Arc::new(sample_catalog()))
}

pub fn memory_api(gateway: &TestGateway) -> TestApi<MemoryStore> {
    init_logging();
    api_with(MemoryStore::new(), gateway, EventProducers::default())
}

/// Places a 100,000 TZS order and returns its id
pub async fn place_order<B: OrderStore>(api: &TestApi<B>, method: PaymentMethod) -> OrderId {
    let outcome = api.process_new_order(order_request(PHONE, method)).await.expect("Error placing order");
    outcome.order_id().clone()
}

pub fn balance_payment(amount: i64, method: PaymentMethod) -> BalancePaymentRequest {
    BalancePaymentRequest { phone: PHONE.into(), amount: tzs(amount), method, notes: None }
}

/// How long a [`PausingStore`] stalls an armed call
pub const PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct PauseState {
    next_order_read: AtomicBool,
    next_payment_insert: AtomicBool,
    paused: Notify,
}

/// Wraps a store and stalls one armed call for [`PAUSE`], so that a second request can run while the first is
/// stopped at a known point. The in-memory store never yields while it is uncontended, so without this two requests
/// joined on one task run one after the other.
#[derive(Debug, Clone)]
pub struct PausingStore<B> {
    inner: B,
    state: Arc<PauseState>,
}

impl<B> PausingStore<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, state: Arc::new(PauseState::default()) }
    }

    /// The next `fetch_order` call returns its result only after the pause.
    pub fn pause_next_order_read(&self) {
        self.state.next_order_read.store(true, Ordering::SeqCst);
    }

    /// The next `insert_payment` call waits out the pause before writing.
    pub fn pause_next_payment_insert(&self) {
        self.state.next_payment_insert.store(true, Ordering::SeqCst);
    }

    /// Resolves once an armed call has started its pause.
    pub async fn paused(&self) {
        self.state.paused.notified().await;
    }

    async fn stall_if(&self, armed: &AtomicBool) {
        if armed.swap(false, Ordering::SeqCst) {
            self.state.paused.notify_one();
            tokio::time::sleep(PAUSE).await;
        }
    }
}

impl<B: OrderStore> OrderStore for PausingStore<B> {
    fn backend_name(&self) -> &'static str {
        "Pausing"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.inner.insert_order(order).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let order = self.inner.fetch_order(order_id).await;
        self.stall_if(&self.state.next_order_read).await;
        order
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        self.inner.search_orders(query).await
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Option<Order>, StoreError> {
        self.inner.update_order(order_id, update).await
    }

    async fn update_payment_summary(&self, order_id: &OrderId, summary: PaymentSummaryUpdate) -> Result<(), StoreError> {
        self.inner.update_payment_summary(order_id, summary).await
    }

    async fn insert_payment(&self, payment: NewOrderPayment) -> Result<OrderPayment, StoreError> {
        self.stall_if(&self.state.next_payment_insert).await;
        self.inner.insert_payment(payment).await
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderPayment>, StoreError> {
        self.inner.fetch_payments_for_order(order_id).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        self.inner.fetch_payment(payment_id).await
    }

    async fn fetch_payment_by_tracking_id(&self, tracking_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        self.inner.fetch_payment_by_tracking_id(tracking_id).await
    }

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<OrderPayment, StoreError> {
        self.inner.update_payment_status(payment_id, status, paid_at).await
    }

    async fn insert_review(&self, review: NewProductReview) -> Result<ProductReview, StoreError> {
        self.inner.insert_review(review).await
    }

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<ProductReview>, StoreError> {
        self.inner.fetch_review_for_order(order_id).await
    }

    async fn fetch_reviews_for_product(&self, product_id: &str) -> Result<Vec<ProductReview>, StoreError> {
        self.inner.fetch_reviews_for_product(product_id).await
    }
}

pub type PausingApi = TestApi<PausingStore<MemoryStore>>;

/// An API over a [`PausingStore`], and a handle on that store for arming pauses
pub fn pausing_api(gateway: &TestGateway, producers: EventProducers) -> (PausingApi, PausingStore<MemoryStore>) {
    init_logging();
    let store = PausingStore::new(MemoryStore::new());
    (api_with(store.clone(), gateway, producers), store)
}
