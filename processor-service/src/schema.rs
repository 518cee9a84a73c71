diesel::table! {
    inventory (product_id) {
        product_id -> Varchar,
        quantity_available -> Int4,
    }
}

diesel::table! {
    orders (order_id) {
        order_id -> Uuid,
        customer_id -> Varchar,
        items -> Jsonb,
        status -> Varchar,
        created_at -> Timestamptz,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    inventory,
    orders,
);
