pub mod forecast;
pub mod open_meteo;
pub mod site;
