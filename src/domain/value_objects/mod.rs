pub mod cartoletas;
