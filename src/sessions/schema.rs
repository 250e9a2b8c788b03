diesel::table! {
    sessions (id) {
        id -> Integer,
        token_digest -> Text,
        user_id -> Text,
        email -> Text,
        created_at -> BigInt,
        expires_at -> BigInt,
        revoked_at -> Nullable<BigInt>,
    }
}
