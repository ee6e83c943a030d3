//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, http::header, web, HttpResponse, Responder};
use duka_engine::{
    db_types::OrderId,
    order_objects::{
        BalancePaymentOutcome,
        BalancePaymentRequest,
        GatewayNotification,
        ModifyOrderRequest,
        NewOrderOutcome,
        NewOrderRequest,
        NotificationOutcome,
        ReviewRequest,
    },
    traits::{OrderStore, PaymentGateway, ProductCatalog},
    AccountApi,
    OrderFlowApi,
    PaymentFlowApi,
    ReviewApi,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{
        AccountOrdersParams,
        AccountOrdersResponse,
        AdminOrderSearchParams,
        GatewayCallbackResult,
        GatewayRedirectParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each bound becomes a type parameter of the route, in order, e.g. `impl OrderStore, PaymentGateway` gives
// `NameRoute<TOrderStore, TPaymentGateway>`. Routes marked `where requires [Admin]` are wrapped in the admin secret
// middleware.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [Admin]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AdminAuthFactory::new());
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(place_order => Post "/orders" impl OrderStore, PaymentGateway, ProductCatalog);
/// Route handler for checkout.
///
/// Prices are always taken from the product catalog. For gateway orders, the response carries the URL that the
/// customer must be sent to in order to pay (`"result": "payment_required"`). All other orders are simply created
/// (`"result": "created"`, with a 201 status).
pub async fn place_order<B, G, C>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B, G, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
    C: ProductCatalog,
{
    let request = body.into_inner();
    debug!("💻️ POST new order for {} ({} lines)", request.customer_name, request.items.len());
    let outcome = api.process_new_order(request).await.map_err(|e| {
        debug!("💻️ Could not place order. {e}");
        ServerError::from(e)
    })?;
    match outcome {
        NewOrderOutcome::Created { .. } => Ok(HttpResponse::Created().json(outcome)),
        NewOrderOutcome::PaymentRequired { .. } => Ok(HttpResponse::Ok().json(outcome)),
    }
}

//----------------------------------------------   Account  ----------------------------------------------------
route!(account_orders => Get "/account/orders" impl OrderStore, PaymentGateway);
/// Route handler for the customer's order history.
///
/// Orders are looked up by phone number (`?phone=`), optionally narrowed to a single order (`&order=`). Any pending
/// gateway payments are checked with the gateway before the orders are returned, so the balances are current.
pub async fn account_orders<B, G>(
    query: web::Query<AccountOrdersParams>,
    api: web::Data<AccountApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
{
    let params = query.into_inner();
    let order_id = params.order_id();
    trace!("💻️ GET account orders (order: {order_id:?})");
    let orders = api.orders_for_phone(&params.phone, order_id.as_ref()).await?;
    Ok(HttpResponse::Ok().json(AccountOrdersResponse { orders }))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(balance_payment => Post "/orders/{id}/payments" impl OrderStore, PaymentGateway);
/// Route handler for installment and balance payments.
///
/// The phone number in the body must match the order's. The amount may not exceed the outstanding balance less any
/// payments that are still awaiting settlement. Gateway payments respond with a redirect URL; bank deposits and cash
/// payments are recorded for confirmation (201).
pub async fn balance_payment<B, G>(
    path: web::Path<OrderId>,
    body: web::Json<BalancePaymentRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ POST {} {} payment for order {order_id}", request.amount, request.method);
    let outcome = api.create_balance_payment(&order_id, request).await.map_err(|e| {
        debug!("💻️ Balance payment for {order_id} was refused. {e}");
        ServerError::from(e)
    })?;
    match outcome {
        BalancePaymentOutcome::Recorded { .. } => Ok(HttpResponse::Created().json(outcome)),
        BalancePaymentOutcome::PaymentRequired { .. } => Ok(HttpResponse::Ok().json(outcome)),
    }
}

route!(gateway_callback => Get "/payments/gateway/callback" impl OrderStore, PaymentGateway);
/// Route handler for the customer's browser returning from the payment gateway.
///
/// The payment is checked with the gateway and the order synced. The browser is then redirected to the storefront's
/// account page with the order id and the resulting payment status. If no storefront URL is configured, the result is
/// returned as JSON instead.
pub async fn gateway_callback<B, G>(
    query: web::Query<GatewayRedirectParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
{
    let params = query.into_inner();
    debug!("💻️ Gateway callback for tracking id {}", params.order_tracking_id);
    let outcome = process_notification(&params, api.as_ref()).await?;
    let result = GatewayCallbackResult {
        order_id: outcome.payment.order_id.clone(),
        payment_id: outcome.payment.id.clone(),
        payment_status: outcome.payment.status,
        order_payment_status: outcome.summary.payment_status,
    };
    if options.storefront_url.is_empty() {
        return Ok(HttpResponse::Ok().json(result));
    }
    let location =
        format!("{}/account?order={}&payment={}", options.storefront_url, result.order_id, result.order_payment_status);
    trace!("💻️ Redirecting customer to {location}");
    Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
}

#[cfg(feature = "pesapal")]
route!(gateway_ipn_get => Get "/payments/gateway/ipn" impl OrderStore, PaymentGateway);
/// Route handler for IPN deliveries that Pesapal sends as a GET request.
#[cfg(feature = "pesapal")]
pub async fn gateway_ipn_get<B, G>(
    query: web::Query<GatewayRedirectParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> HttpResponse
where
    B: OrderStore,
    G: PaymentGateway,
{
    acknowledge_ipn(query.into_inner(), api.as_ref()).await
}

#[cfg(feature = "pesapal")]
route!(gateway_ipn_post => Post "/payments/gateway/ipn" impl OrderStore, PaymentGateway);
/// Route handler for IPN deliveries that Pesapal sends as a POST request.
#[cfg(feature = "pesapal")]
pub async fn gateway_ipn_post<B, G>(
    body: web::Json<GatewayRedirectParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> HttpResponse
where
    B: OrderStore,
    G: PaymentGateway,
{
    acknowledge_ipn(body.into_inner(), api.as_ref()).await
}

/// Processes an IPN delivery and builds the acknowledgement Pesapal expects. The acknowledgement is always sent with
/// a 200 status; failures are reported in its `status` field so that Pesapal retries the delivery.
#[cfg(feature = "pesapal")]
async fn acknowledge_ipn<B, G>(params: GatewayRedirectParams, api: &PaymentFlowApi<B, G>) -> HttpResponse
where
    B: OrderStore,
    G: PaymentGateway,
{
    debug!("💻️ IPN {} for tracking id {}", params.notification_type(), params.order_tracking_id);
    let success = match process_notification(&params, api).await {
        Ok(outcome) => {
            info!(
                "💻️ IPN for {} processed. Payment {} is {}. Order {} is {}",
                params.order_tracking_id,
                outcome.payment.id,
                outcome.payment.status,
                outcome.summary.order_id,
                outcome.summary.payment_status
            );
            true
        },
        Err(e) => {
            warn!("💻️ IPN for {} could not be processed. {e}", params.order_tracking_id);
            false
        },
    };
    let ack = pesapal_tools::IpnAcknowledgement::new(
        params.notification_type(),
        &params.order_tracking_id,
        params.merchant_reference(),
        success,
    );
    HttpResponse::Ok().json(ack)
}

async fn process_notification<B, G>(
    params: &GatewayRedirectParams,
    api: &PaymentFlowApi<B, G>,
) -> Result<NotificationOutcome, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
{
    let tracking_id = params.order_tracking_id.trim();
    if tracking_id.is_empty() {
        return Err(ServerError::InvalidRequestBody("The gateway tracking id is missing".into()));
    }
    let notification = GatewayNotification {
        tracking_id: tracking_id.to_string(),
        merchant_reference: params.order_merchant_reference.clone().filter(|s| !s.trim().is_empty()),
    };
    let outcome = api.process_gateway_notification(notification).await?;
    Ok(outcome)
}

//----------------------------------------------   Reviews  ----------------------------------------------------
route!(submit_review => Post "/orders/{id}/review" impl OrderStore);
/// Route handler for product reviews. Only delivered orders can be reviewed, and only once.
pub async fn submit_review<B: OrderStore>(
    path: web::Path<OrderId>,
    body: web::Json<ReviewRequest>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST review for order {order_id}");
    let review = api.submit_review(&order_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(review))
}

route!(product_reviews => Get "/products/{id}/reviews" impl OrderStore);
pub async fn product_reviews<B: OrderStore>(
    path: web::Path<String>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    trace!("💻️ GET reviews for product {product_id}");
    let reviews = api.reviews_for_product(&product_id).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(modify_order => Patch "/orders/{id}" impl OrderStore, PaymentGateway, ProductCatalog where requires [Admin]);
/// Route handler for administrative order changes.
///
/// The body may carry a new fulfilment `status`, a `paymentStatus` override (only `paid` is accepted, and it settles
/// the outstanding balance with a manual payment) and a `shippingAdjustment`. The updated order is returned.
pub async fn modify_order<B, G, C>(
    path: web::Path<OrderId>,
    body: web::Json<ModifyOrderRequest>,
    api: web::Data<OrderFlowApi<B, G, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
    C: ProductCatalog,
{
    let order_id = path.into_inner();
    info!("💻️ PATCH order {order_id}: {:?}", body.0);
    let order = api.modify_order(&order_id, body.into_inner()).await.map_err(|e| {
        debug!("💻️ Could not modify order {order_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(confirm_payment => Post "/admin/payments/{id}/confirm" impl OrderStore, PaymentGateway where requires [Admin]);
/// Route handler for confirming a bank deposit, or settling a stalled gateway payment by hand.
pub async fn confirm_payment<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
{
    let payment_id = path.into_inner();
    info!("💻️ Confirming payment {payment_id}");
    let outcome = api.confirm_payment(&payment_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(admin_orders => Get "/admin/orders" impl OrderStore, PaymentGateway, ProductCatalog where requires [Admin]);
/// Route handler for the admin order list, newest first.
///
/// Query parameters (all optional): `status` (comma-separated fulfilment statuses), `payment_status`, `phone`,
/// `since` and `until` (RFC 3339 timestamps).
pub async fn admin_orders<B, G, C>(
    query: web::Query<AdminOrderSearchParams>,
    api: web::Data<OrderFlowApi<B, G, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
    C: ProductCatalog,
{
    let params = query.into_inner();
    let filter = params.to_filter()?;
    let orders = api.search_orders(filter, params.payment_status).await?;
    debug!("💻️ Admin order search returned {} orders", orders.len());
    Ok(HttpResponse::Ok().json(orders))
}

route!(admin_order => Get "/admin/orders/{id}" impl OrderStore, PaymentGateway, ProductCatalog where requires [Admin]);
pub async fn admin_order<B, G, C>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, G, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: PaymentGateway,
    C: ProductCatalog,
{
    let order_id = path.into_inner();
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(order))
}
