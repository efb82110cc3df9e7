mod color;
mod print_results;
