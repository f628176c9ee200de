pub mod http_act;
