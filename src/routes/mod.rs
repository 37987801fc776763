pub mod auth;
pub mod banners;
pub mod branches;
pub mod brands;
pub mod categories;
pub mod consultations;
pub mod countries;
pub mod customers;
pub mod manufacturers;
pub mod orders;
pub mod payment_types;
pub mod prescriptions;
pub mod products;
pub mod promotions;
pub mod reviews;
pub mod shipping_methods;
pub mod staff;
pub mod statistics;
