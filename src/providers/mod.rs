pub mod yahoo_chart;
